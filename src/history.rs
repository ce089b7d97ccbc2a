//! Per-iteration history as CSV.

use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::controller::{IterationObserver, IterationRecord, OptimizationResult};
use crate::error::Result;

/// Writes one CSV row per iteration
///
/// Columns: `iteration, objective, compliance, volume_fraction,
/// output_displacement, g0 .. g{m-1}, beta, change, converged,
/// inner_iterations, oc_capped, mma_infeasible`. The header is written with
/// the first row, once the number of constraints is known.
pub struct HistoryWriter<W: Write> {
    writer: Writer<W>,
    header_written: bool,
}

impl HistoryWriter<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::from_writer(inner),
            header_written: false,
        }
    }

    pub fn write(&mut self, record: &IterationRecord) -> Result<()> {
        if !self.header_written {
            let mut header: Vec<String> = ["iteration", "objective", "compliance", "volume_fraction", "output_displacement"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            header.extend((0..record.constraints.len()).map(|i| format!("g{i}")));
            header.extend(
                ["beta", "change", "converged", "inner_iterations", "oc_capped", "mma_infeasible"]
                    .iter()
                    .map(|s| s.to_string()),
            );
            self.writer.write_record(&header)?;
            self.header_written = true;
        }

        let mut row = vec![
            record.iteration.to_string(),
            record.objective.to_string(),
            record.compliance.to_string(),
            record.volume_fraction.to_string(),
            record
                .output_displacement
                .map(|u| u.to_string())
                .unwrap_or_default(),
        ];
        row.extend(record.constraints.iter().map(|g| g.to_string()));
        row.extend([
            record.beta.to_string(),
            record.change.to_string(),
            record.converged.to_string(),
            record.diagnostics.inner_iterations.to_string(),
            record.diagnostics.bisection_capped.to_string(),
            record.diagnostics.infeasible.to_string(),
        ]);
        self.writer.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::TopOptError::Io(e.into_error()))
    }
}

impl<W: Write + Send> IterationObserver for HistoryWriter<W> {
    fn on_iteration(&mut self, record: &IterationRecord, _design: &[f64], _physical: &[f64]) -> Result<()> {
        self.write(record)?;
        self.flush()
    }

    fn on_finish(&mut self, _result: &OptimizationResult) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::UpdateDiagnostics;

    fn record(iteration: usize) -> IterationRecord {
        IterationRecord {
            iteration,
            objective: 10.0 / iteration as f64,
            compliance: 10.0 / iteration as f64,
            volume_fraction: 0.5,
            output_displacement: None,
            constraints: vec![-0.01],
            beta: 1.0,
            change: 0.2,
            converged: false,
            diagnostics: UpdateDiagnostics {
                inner_iterations: 42,
                multipliers: vec![3.0],
                bisection_capped: false,
                infeasible: false,
            },
        }
    }

    #[test]
    fn test_header_and_rows() {
        let mut writer = HistoryWriter::new(Vec::new());
        writer.write(&record(1)).unwrap();
        writer.write(&record(2)).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "iteration,objective,compliance,volume_fraction,output_displacement,g0,beta,change,converged,inner_iterations,oc_capped,mma_infeasible"
        );
        assert_eq!(lines[2], "2,5,5,0.5,,-0.01,1,0.2,false,42,false,false");
    }
}
