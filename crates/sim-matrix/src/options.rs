//! # How to Add a New Matrix Option
//!
//! 1. Add an entry to the `OPTION_DEFS` array below:
//!    ```ignore
//!    OptionDef {
//!        name: "myoption",
//!        description: "What this option controls",
//!        default: OptionValue::Float(1.0),
//!        range: OptionRange::FloatRange(0.0, 100.0),
//!    },
//!    ```
//!
//! 2. Read it in `MatrixConfig::from_options`, or anywhere you hold a
//!    `MatrixOptions`:
//!    ```ignore
//!    let val = options.get_float("myoption");
//!    if options.is_set("myoption") { /* user explicitly set it */ }
//!    ```
//!
//! Parsing, validation, range checking and redefinition warnings are handled
//! by `MatrixOptions::set`. Options are read once when a matrix is built, never
//! inside the factor/solve loop.

use crate::backend::BackendKind;
use crate::klu::{FillOrdering, KluConfig, RowScaling};
use std::collections::HashMap;

/// Typed value for a matrix option.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Float(f64),
    Str(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Range constraint for validating option values.
#[derive(Debug, Clone)]
pub enum OptionRange {
    /// Exclusive range for floats: (min, max).
    FloatRange(f64, f64),
    /// Half-open range for floats: [min, max).
    FloatRangeFrom(f64, f64),
    /// Enumerated set of allowed string values.
    StringEnum(&'static [&'static str]),
}

/// Static definition of one matrix option.
#[derive(Debug, Clone)]
pub struct OptionDef {
    pub name: &'static str,
    pub description: &'static str,
    pub default: OptionValue,
    pub range: OptionRange,
}

/// All known matrix options.
const OPTION_DEFS: &[OptionDef] = &[
    OptionDef {
        name: "pivtol",
        description: "Absolute pivot threshold",
        default: OptionValue::Float(1e-13),
        range: OptionRange::FloatRangeFrom(0.0, 1.0),
    },
    OptionDef {
        name: "pivrel",
        description: "Relative pivot threshold",
        default: OptionValue::Float(1e-3),
        range: OptionRange::FloatRange(0.0, 1.0),
    },
    OptionDef {
        name: "gmin",
        description: "Conductance added to every diagonal",
        default: OptionValue::Float(1e-12),
        range: OptionRange::FloatRangeFrom(0.0, 1e-3),
    },
    OptionDef {
        name: "solver",
        description: "LU backend",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(&["sparse", "klu"]),
    },
    OptionDef {
        name: "klu_pivot_tol",
        description: "Partial pivoting threshold of the klu backend",
        default: OptionValue::Float(1e-3),
        range: OptionRange::FloatRange(0.0, 1.0),
    },
    OptionDef {
        name: "klu_scale",
        description: "Row scaling of the klu backend",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(&["none", "max"]),
    },
    OptionDef {
        name: "klu_ordering",
        description: "Fill-reducing ordering of the klu backend",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(&["amd", "natural"]),
    },
];

/// A stored option entry with its current value and whether the user set it.
#[derive(Debug, Clone)]
struct OptionEntry {
    value: OptionValue,
    is_set: bool,
}

/// Container for all matrix options.
///
/// Constructed with defaults from `OPTION_DEFS`. Call `set()` to apply
/// user-specified values.
#[derive(Debug, Clone)]
pub struct MatrixOptions {
    entries: HashMap<String, OptionEntry>,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixOptions {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for def in OPTION_DEFS {
            entries.insert(
                def.name.to_string(),
                OptionEntry {
                    value: default_value(def),
                    is_set: false,
                },
            );
        }
        Self { entries }
    }

    /// One-line description of a known option.
    pub fn describe(key: &str) -> Option<&'static str> {
        let key_lower = key.to_ascii_lowercase();
        OPTION_DEFS
            .iter()
            .find(|d| d.name == key_lower)
            .map(|d| d.description)
    }

    /// Set an option by name from a raw string value.
    ///
    /// Parses the value according to the option's type, validates against
    /// its range, and stores it. Unknown options, parse errors and
    /// out-of-range values are logged and ignored. Setting an option twice
    /// keeps the new value and warns about the redefinition.
    pub fn set(&mut self, key: &str, raw_value: &str) {
        let key_lower = key.to_ascii_lowercase();

        let def = match OPTION_DEFS.iter().find(|d| d.name == key_lower) {
            Some(d) => d,
            None => {
                log::warn!("unknown option '{}' ignored", key);
                return;
            }
        };

        let parsed = match &def.default {
            OptionValue::Float(_) => match parse_option_float(raw_value) {
                Some(v) => OptionValue::Float(v),
                None => {
                    log::warn!(
                        "option '{}' value '{}' is not a valid number, ignored",
                        key_lower,
                        raw_value
                    );
                    return;
                }
            },
            OptionValue::Str(_) => OptionValue::Str(raw_value.trim().to_ascii_lowercase()),
        };

        if !validate_range(&parsed, &def.range) {
            log::warn!(
                "option '{}' ({}) value {} out of range ({}), keeping {}",
                key_lower,
                def.description,
                parsed,
                format_range(&def.range),
                self.entries
                    .get(&key_lower)
                    .map(|e| e.value.to_string())
                    .unwrap_or_default()
            );
            return;
        }

        if let Some(entry) = self.entries.get(&key_lower) {
            if entry.is_set {
                log::warn!(
                    "option '{}' redefined (was {}), using new value {}",
                    key_lower,
                    entry.value,
                    parsed
                );
            }
        }

        self.entries.insert(
            key_lower,
            OptionEntry {
                value: parsed,
                is_set: true,
            },
        );
    }

    pub fn get_float(&self, key: &str) -> f64 {
        match self.entries.get(key).map(|e| &e.value) {
            Some(OptionValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn get_string(&self, key: &str) -> &str {
        match self.entries.get(key).map(|e| &e.value) {
            Some(OptionValue::Str(v)) => v.as_str(),
            _ => "",
        }
    }

    /// Check whether the user explicitly set this option.
    pub fn is_set(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.is_set)
    }
}

/// String defaults can't be built in a const table.
fn default_value(def: &OptionDef) -> OptionValue {
    match (def.name, &def.default) {
        ("solver", _) => OptionValue::Str(BackendKind::default().name().to_string()),
        ("klu_scale", _) => OptionValue::Str("max".to_string()),
        ("klu_ordering", _) => OptionValue::Str("amd".to_string()),
        (_, value) => value.clone(),
    }
}

fn validate_range(value: &OptionValue, range: &OptionRange) -> bool {
    match (value, range) {
        (OptionValue::Float(v), OptionRange::FloatRange(min, max)) => *v > *min && *v < *max,
        (OptionValue::Float(v), OptionRange::FloatRangeFrom(min, max)) => *v >= *min && *v < *max,
        (OptionValue::Str(v), OptionRange::StringEnum(allowed)) => {
            allowed.iter().any(|a| a.eq_ignore_ascii_case(v))
        }
        _ => true,
    }
}

fn format_range(range: &OptionRange) -> String {
    match range {
        OptionRange::FloatRange(min, max) => format!("{} to {}", min, max),
        OptionRange::FloatRangeFrom(min, max) => format!("{} (inclusive) to {}", min, max),
        OptionRange::StringEnum(values) => format!("one of: {}", values.join(", ")),
    }
}

fn parse_option_float(s: &str) -> Option<f64> {
    parse_number_with_suffix(s).or_else(|| s.trim().parse().ok())
}

/// Parse a number with an optional SPICE scale suffix (`1p`, `10meg`, `2.2k`).
pub fn parse_number_with_suffix(token: &str) -> Option<f64> {
    let lower = token.trim().to_ascii_lowercase();
    if !lower.is_ascii() {
        return None;
    }
    let (num_str, multiplier) = if let Some(value_part) = lower.strip_suffix("meg") {
        (value_part, 1e6)
    } else {
        let (value_part, suffix) = lower.split_at(lower.len().saturating_sub(1));
        match suffix {
            "f" => (value_part, 1e-15),
            "p" => (value_part, 1e-12),
            "n" => (value_part, 1e-9),
            "u" => (value_part, 1e-6),
            "m" => (value_part, 1e-3),
            "k" => (value_part, 1e3),
            "g" => (value_part, 1e9),
            "t" => (value_part, 1e12),
            _ => (lower.as_str(), 1.0),
        }
    };
    num_str.parse::<f64>().ok().map(|num| num * multiplier)
}

// ============================================================================
// Typed configuration
// ============================================================================

/// Per-matrix configuration, fixed when the matrix is built.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub backend: BackendKind,
    /// Relative pivot threshold used by `reorder` when none is given.
    pub pivot_rel_tol: f64,
    /// Absolute pivot threshold; also the singularity threshold of the
    /// classical backend's `factorize`.
    pub pivot_abs_tol: f64,
    pub gmin: f64,
    pub klu: KluConfig,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self::from_options(&MatrixOptions::new())
    }
}

impl MatrixConfig {
    pub fn with_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn from_options(options: &MatrixOptions) -> Self {
        let backend = match options.get_string("solver") {
            "sparse" => BackendKind::Classical,
            _ => BackendKind::Precompiled,
        };
        let scaling = match options.get_string("klu_scale") {
            "none" => RowScaling::None,
            _ => RowScaling::Max,
        };
        let ordering = match options.get_string("klu_ordering") {
            "natural" => FillOrdering::Natural,
            _ => FillOrdering::Amd,
        };
        Self {
            backend,
            pivot_rel_tol: options.get_float("pivrel"),
            pivot_abs_tol: options.get_float("pivtol"),
            gmin: options.get_float("gmin"),
            klu: KluConfig {
                pivot_tol: options.get_float("klu_pivot_tol"),
                ordering,
                scaling,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = MatrixOptions::new();
        assert!((opts.get_float("pivtol") - 1e-13).abs() < 1e-25);
        assert!((opts.get_float("pivrel") - 1e-3).abs() < 1e-15);
        assert!((opts.get_float("gmin") - 1e-12).abs() < 1e-24);
        assert_eq!(opts.get_string("solver"), "klu");
        assert_eq!(opts.get_string("klu_scale"), "max");
        assert_eq!(opts.get_string("klu_ordering"), "amd");
        assert!(!opts.is_set("solver"));
    }

    #[test]
    fn test_config_from_defaults() {
        let config = MatrixConfig::default();
        assert_eq!(config.backend, BackendKind::Precompiled);
        assert_eq!(config.klu.scaling, RowScaling::Max);
        assert_eq!(config.klu.ordering, FillOrdering::Amd);
        assert!((config.klu.pivot_tol - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_select_classical() {
        let mut opts = MatrixOptions::new();
        opts.set("SOLVER", "Sparse");
        assert!(opts.is_set("solver"));
        let config = MatrixConfig::from_options(&opts);
        assert_eq!(config.backend, BackendKind::Classical);
    }

    #[test]
    fn test_string_enum_rejects_unknown() {
        let mut opts = MatrixOptions::new();
        opts.set("solver", "superlu");
        assert_eq!(opts.get_string("solver"), "klu");
        assert!(!opts.is_set("solver"));
    }

    #[test]
    fn test_klu_options() {
        let mut opts = MatrixOptions::new();
        opts.set("klu_scale", "none");
        opts.set("klu_ordering", "natural");
        opts.set("klu_pivot_tol", "0.1");
        let config = MatrixConfig::from_options(&opts);
        assert_eq!(config.klu.scaling, RowScaling::None);
        assert_eq!(config.klu.ordering, FillOrdering::Natural);
        assert!((config.klu.pivot_tol - 0.1).abs() < 1e-15);
    }

    #[test]
    fn test_out_of_range_float() {
        let mut opts = MatrixOptions::new();
        // pivrel range is (0, 1)
        opts.set("pivrel", "2");
        assert!((opts.get_float("pivrel") - 1e-3).abs() < 1e-15);
        assert!(!opts.is_set("pivrel"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(MatrixOptions::describe("PIVTOL"), Some("Absolute pivot threshold"));
        assert_eq!(MatrixOptions::describe("klu_scale"), Some("Row scaling of the klu backend"));
        assert_eq!(MatrixOptions::describe("reltol"), None);
    }

    #[test]
    fn test_zero_tolerances_accepted() {
        let mut opts = MatrixOptions::new();
        opts.set("pivtol", "0");
        opts.set("gmin", "0");
        assert!(opts.is_set("pivtol") && opts.is_set("gmin"));
        let config = MatrixConfig::from_options(&opts);
        assert_eq!(config.pivot_abs_tol, 0.0);
        assert_eq!(config.gmin, 0.0);

        // pivrel keeps its exclusive lower bound
        opts.set("pivrel", "0");
        assert!(!opts.is_set("pivrel"));
    }

    #[test]
    fn test_unknown_option() {
        let mut opts = MatrixOptions::new();
        opts.set("reltol", "1e-3");
        assert!(!opts.is_set("reltol"));
    }

    #[test]
    fn test_redefinition_keeps_new_value() {
        let mut opts = MatrixOptions::new();
        opts.set("gmin", "1e-9");
        opts.set("gmin", "1e-10");
        assert!((opts.get_float("gmin") - 1e-10).abs() < 1e-22);
    }

    #[test]
    fn test_spice_suffix() {
        let mut opts = MatrixOptions::new();
        opts.set("gmin", "1p");
        assert!((opts.get_float("gmin") - 1e-12).abs() < 1e-24);

        assert_eq!(parse_number_with_suffix("10meg"), Some(1e7));
        assert_eq!(parse_number_with_suffix("2k"), Some(2e3));
        assert_eq!(parse_number_with_suffix("abc"), None);
    }

    #[test]
    fn test_invalid_value() {
        let mut opts = MatrixOptions::new();
        opts.set("pivtol", "abc");
        assert!((opts.get_float("pivtol") - 1e-13).abs() < 1e-25);
        assert!(!opts.is_set("pivtol"));
    }
}
