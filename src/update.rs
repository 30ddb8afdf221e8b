//! Wraps a component's source reader with counting/gzip decoration and
//! dispatches it to the matching installer strategy.

use std::io::Read;

use crate::error::{Error, Result};
use crate::install::pipe::PipeOptions;
use crate::install::{default_strategies, InstallerStrategy};
use crate::io::{CountingReader, GzipReader};
use crate::manifest::Component;

pub struct UpdateModule {
    strategies: Vec<Box<dyn InstallerStrategy>>,
}

impl Default for UpdateModule {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
        }
    }
}

impl UpdateModule {
    pub fn new(strategies: Vec<Box<dyn InstallerStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn execute_component<R: Read>(
        &self,
        comp: &Component,
        source: R,
        opt: &PipeOptions<'_>,
    ) -> Result<()> {
        log::info!(
            "update: name={} type={} file={}",
            comp.name,
            comp.kind.as_str(),
            comp.filename
        );

        let mut counting = CountingReader::new(source);
        let bytes_in = counting.counter();
        let tag = comp.name.clone();

        let mut reader: Box<dyn Read> = if ends_with_gz(&comp.filename) {
            log::debug!("wrapping gzip reader for {}", comp.filename);
            Box::new(GzipReader::new(&mut counting))
        } else {
            Box::new(&mut counting)
        };

        let effective_opt = PipeOptions { bytes_in, ..*opt };

        for strategy in &self.strategies {
            if strategy.supports(comp) {
                return strategy.install(comp, reader.as_mut(), &effective_opt, &tag);
            }
        }

        Err(Error::UnsupportedComponentType(comp.kind.as_str().to_string()))
    }
}

fn ends_with_gz(name: &str) -> bool {
    name.ends_with(".gz")
}
