//! Warning accumulation (spec §7): "Warnings (high null-share, zero-variance
//! columns) are accumulated in a warner and returned alongside success."
//!
//! Every warning is also emitted through `tracing::warn!` as it's recorded,
//! so a caller watching logs sees them live; the accumulated list is for
//! the caller that only gets the final `Pipeline::fit` return value.

use crate::frame::Df;

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub frame: String,
    pub column: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Warner {
    warnings: Vec<Warning>,
}

impl Warner {
    pub fn new() -> Self {
        Warner::default()
    }

    pub fn push(&mut self, frame: impl Into<String>, column: impl Into<String>, message: impl Into<String>) {
        let warning = Warning { frame: frame.into(), column: column.into(), message: message.into() };
        tracing::warn!(frame = %warning.frame, column = %warning.column, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn extend(&mut self, other: Warner) {
        self.warnings.extend(other.warnings);
    }

    /// Scans every numerical column of `df` and records a warning for
    /// high-null-share (>50%) or zero-variance columns, per spec §7's
    /// named examples.
    pub fn scan_numerical(&mut self, df: &Df) {
        for name in df.numerical_names() {
            let Some(col) = df.numerical(name) else { continue };
            let values = col.as_slice();
            if values.is_empty() {
                continue;
            }
            let null_count = values.iter().filter(|v| v.is_nan()).count();
            let null_share = null_count as f64 / values.len() as f64;
            if null_share > 0.5 {
                self.push(df.name(), name, format!("{:.0}% null values", null_share * 100.0));
            }
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.len() > 1 {
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
                if variance == 0.0 {
                    self.push(df.name(), name, "zero variance");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::NumCol;

    #[test]
    fn flags_high_null_share_and_zero_variance() {
        let mut df = Df::new("t", 4);
        df.add_numerical(NumCol::from_vec("mostly_null", vec![1.0, f64::NAN, f64::NAN, f64::NAN])).unwrap();
        df.add_numerical(NumCol::from_vec("constant", vec![5.0, 5.0, 5.0, 5.0])).unwrap();
        df.add_numerical(NumCol::from_vec("fine", vec![1.0, 2.0, 3.0, 4.0])).unwrap();

        let mut warner = Warner::new();
        warner.scan_numerical(&df);

        assert!(warner.warnings().iter().any(|w| w.column == "mostly_null"));
        assert!(warner.warnings().iter().any(|w| w.column == "constant"));
        assert!(!warner.warnings().iter().any(|w| w.column == "fine"));
    }
}
