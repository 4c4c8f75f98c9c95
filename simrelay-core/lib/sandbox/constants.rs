//! Default constants made available to every program.
//!
//! Programs written against the original course material expect names such as `GRID_WIDTH` or
//! `GREEN` to exist without defining them. The bootstrapper writes them to an explicit module that
//! the harness seeds into the entry module and that stubs import. Simple literal assignments in
//! the bundle's own `constants.py` override the defaults.

use std::{fmt, sync::LazyLock};

use regex::Regex;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9_]*)\s*=\s*(.+?)\s*(?:#.*)?$").unwrap()
});

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

static FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+\.\d*$").unwrap());

static STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:'([^'\\]*)'|"([^"\\]*)")$"#).unwrap()
});

static INT_TUPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*(-?\d+(?:\s*,\s*-?\d+)*)\s*,?\s*\)$").unwrap()
});

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A literal value that can be written back as Python source.
#[derive(Debug, Clone, PartialEq)]
pub enum PyLiteral {
    /// An integer
    Int(i64),

    /// A float
    Float(f64),

    /// A string without escapes
    Str(String),

    /// A tuple of integers, such as an RGB colour
    IntTuple(Vec<i64>),
}

/// The ordered set of default constants for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultConstants {
    values: Vec<(String, PyLiteral)>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PyLiteral {
    /// Parses a simple literal. Anything more complex yields `None`.
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();

        if INTEGER.is_match(source) {
            return source.parse().ok().map(Self::Int);
        }

        if FLOAT.is_match(source) {
            return source.parse().ok().map(Self::Float);
        }

        if let Some(captures) = STRING.captures(source) {
            let text = captures.get(1).or_else(|| captures.get(2))?;
            return Some(Self::Str(text.as_str().to_string()));
        }

        if let Some(captures) = INT_TUPLE.captures(source) {
            let items = captures[1]
                .split(',')
                .map(|item| item.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            return Some(Self::IntTuple(items));
        }

        None
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl DefaultConstants {
    /// The built-in defaults.
    pub fn builtin() -> Self {
        let cell_size = 20;
        let grid_width = 30;
        let grid_height = 20;

        let rgb = |r, g, b| PyLiteral::IntTuple(vec![r, g, b]);
        let text = |s: &str| PyLiteral::Str(s.to_string());

        let values = vec![
            ("CELL_SIZE", PyLiteral::Int(cell_size)),
            ("GRID_WIDTH", PyLiteral::Int(grid_width)),
            ("GRID_HEIGHT", PyLiteral::Int(grid_height)),
            ("SCREEN_WIDTH", PyLiteral::Int(grid_width * cell_size)),
            ("SCREEN_HEIGHT", PyLiteral::Int(grid_height * cell_size)),
            ("FPS", PyLiteral::Int(10)),
            ("FONT_SIZE", PyLiteral::Int(24)),
            ("BLACK", rgb(0, 0, 0)),
            ("WHITE", rgb(255, 255, 255)),
            ("RED", rgb(255, 0, 0)),
            ("GREEN", rgb(0, 255, 0)),
            ("BLUE", rgb(0, 0, 255)),
            ("GRAY", rgb(128, 128, 128)),
            ("UP", text("UP")),
            ("DOWN", text("DOWN")),
            ("LEFT", text("LEFT")),
            ("RIGHT", text("RIGHT")),
        ];

        Self {
            values: values
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    /// The built-in defaults, overridden by simple literal assignments found in `constants_py`.
    ///
    /// Only known names are overridden. Screen dimensions are derived from the grid and cell size
    /// unless the source assigns them explicitly.
    pub fn with_overrides(constants_py: Option<&str>) -> Self {
        let mut defaults = Self::builtin();
        let Some(source) = constants_py else {
            return defaults;
        };

        let mut assigned = Vec::new();
        for line in source.lines() {
            let Some(captures) = ASSIGNMENT.captures(line) else {
                continue;
            };

            let name = &captures[1];
            if let Some(value) = PyLiteral::parse(&captures[2]) {
                if defaults.set(name, value) {
                    assigned.push(name.to_string());
                }
            }
        }

        for (screen, grid) in [("SCREEN_WIDTH", "GRID_WIDTH"), ("SCREEN_HEIGHT", "GRID_HEIGHT")] {
            if assigned.iter().any(|name| name == screen) {
                continue;
            }

            let derived = defaults
                .get(grid)
                .and_then(PyLiteral::as_int)
                .zip(defaults.get("CELL_SIZE").and_then(PyLiteral::as_int))
                .map(|(cells, size)| cells.saturating_mul(size));

            if let Some(value) = derived {
                defaults.set(screen, PyLiteral::Int(value));
            }
        }

        defaults
    }

    /// Returns a value by name.
    pub fn get(&self, name: &str) -> Option<&PyLiteral> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Replaces a known value. Returns `false` for unknown names.
    fn set(&mut self, name: &str, value: PyLiteral) -> bool {
        match self.values.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Renders the defaults module.
    pub fn render(&self) -> String {
        let mut out = String::from("# Generated by simrelay. Default constants.\n");
        for (name, value) in &self.values {
            out.push_str(&format!("{name} = {value}\n"));
        }
        out
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for PyLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::IntTuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Self::IntTuple(items) => {
                let items: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
