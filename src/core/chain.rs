use std::path::Path;

use crate::core::error::{Error, Result};

pub const CHAIN_EXT: &str = "chain";

/// Link from a derived record to its parent record plus the crop placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub parent: String,
    pub left: u32,
    pub top: u32,
}

/// One persisted derivation record.
///
/// Roots carry only their raster artifact name. Derived records add the
/// parent record name and the crop offsets; an empty raster name on a
/// derived record means the diff was empty and no crop file exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub raster: String,
    pub link: Option<ChainLink>,
}

impl ChainRecord {
    pub fn root(raster: impl Into<String>) -> Self {
        ChainRecord {
            raster: raster.into(),
            link: None,
        }
    }

    pub fn derived(raster: impl Into<String>, parent: impl Into<String>, left: u32, top: u32) -> Self {
        ChainRecord {
            raster: raster.into(),
            link: Some(ChainLink {
                parent: parent.into(),
                left,
                top,
            }),
        }
    }

    pub fn render(&self) -> String {
        match &self.link {
            None => format!("{}\n", self.raster),
            Some(link) => format!(
                "{}\n{}\n{}\n{}\n",
                self.raster, link.parent, link.left, link.top
            ),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let raster = lines
            .next()
            .ok_or_else(|| Error::InvalidInput("empty chain record".into()))?
            .trim()
            .to_string();

        let Some(parent) = lines.next() else {
            if raster.is_empty() {
                return Err(Error::InvalidInput(
                    "root chain record without a raster name".into(),
                ));
            }
            return Ok(ChainRecord::root(raster));
        };

        let left = parse_offset(lines.next(), "left")?;
        let top = parse_offset(lines.next(), "top")?;
        Ok(ChainRecord::derived(raster, parent.trim(), left, top))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::parse(&text)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).map_err(|e| Error::write(path, e))
    }
}

fn parse_offset(line: Option<&str>, which: &str) -> Result<u32> {
    let line =
        line.ok_or_else(|| Error::InvalidInput(format!("chain record missing {which} offset")))?;
    line.trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("bad {which} offset \"{line}\" in chain record")))
}
