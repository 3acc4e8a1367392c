//! `faascheck list` command handler

use std::io::Write;

use serde::Serialize;

use faascheck_chaos::FaultKind;
use faascheck_engine::Suite;

use crate::commands::run::FAULTS_SUITE;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&CatalogReport::new())
}

/// Selectable suites and fault classes.
#[derive(Debug, Serialize)]
pub struct CatalogReport {
    pub suites: Vec<&'static str>,
    pub faults: Vec<FaultEntry>,
}

/// One fault class and the signature that detects it.
#[derive(Debug, Serialize)]
pub struct FaultEntry {
    pub name: &'static str,
    pub signature: &'static str,
}

impl CatalogReport {
    pub fn new() -> Self {
        let mut suites: Vec<&'static str> = Suite::ALL.iter().map(|s| s.as_str()).collect();
        suites.push(FAULTS_SUITE);
        let faults = FaultKind::ALL
            .iter()
            .map(|kind| FaultEntry {
                name: kind.as_str(),
                signature: kind.signature(),
            })
            .collect();
        Self { suites, faults }
    }
}

impl Default for CatalogReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for CatalogReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Suites:")?;
        for suite in &self.suites {
            writeln!(w, "  {suite}")?;
        }
        writeln!(w)?;
        writeln!(w, "Faults:")?;
        for fault in &self.faults {
            writeln!(w, "  {:<24} {}", fault.name, fault.signature)?;
        }
        Ok(())
    }
}
