//! Snapshot encoding.
//!
//! The encoder never fails. Programs that define only some of the expected variables still
//! produce a snapshot, with status text naming what is missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProgramState;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Grid width used when the program does not define `GRID_WIDTH`.
pub const DEFAULT_GRID_WIDTH: u32 = 30;

/// Grid height used when the program does not define `GRID_HEIGHT`.
pub const DEFAULT_GRID_HEIGHT: u32 = 20;

const SNAKE_VAR: &str = "snake";
const FOOD_VAR: &str = "food";
const SNAKE_FIELDS: &[&str] = &["positions", "body", "segments"];
const FOOD_SINGLE_FIELDS: &[&str] = &["position", "pos"];
const FOOD_MULTI_FIELDS: &[&str] = &["positions"];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A structured, transport-safe description of the simulated world at one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frame counter reported by the worker
    pub frame: u64,

    /// Grid dimensions in cells
    pub grid: GridSize,

    /// Named sequences of occupied cells
    pub entities: Vec<Entity>,

    /// Current score
    pub score: i64,

    /// Whether the program reports the game as over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_over: Option<bool>,

    /// Text to show on top of the grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusText>,
}

/// Grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of columns
    pub width: u32,

    /// Number of rows
    pub height: u32,
}

/// A named sequence of cell positions, such as the snake body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity name
    pub name: String,

    /// Occupied cells, head first where that matters
    pub cells: Vec<Cell>,
}

/// A grid cell, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell(pub i64, pub i64);

/// Status text shown to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusText {
    /// Headline
    pub title: String,

    /// Main text
    pub body: String,

    /// Optional hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Snapshot {
    /// Encodes the program state captured at `frame`.
    pub fn encode(frame: u64, state: &ProgramState) -> Self {
        let grid = GridSize {
            width: positive_dimension(state.get("GRID_WIDTH")).unwrap_or(DEFAULT_GRID_WIDTH),
            height: positive_dimension(state.get("GRID_HEIGHT")).unwrap_or(DEFAULT_GRID_HEIGHT),
        };

        let mut entities = Vec::new();
        let mut missing = Vec::new();

        match state.get(SNAKE_VAR).and_then(snake_cells) {
            Some(cells) => entities.push(Entity::new(SNAKE_VAR, cells)),
            None => missing.push(SNAKE_VAR),
        }

        match state.get(FOOD_VAR).and_then(food_cells) {
            Some(cells) => entities.push(Entity::new(FOOD_VAR, cells)),
            None => missing.push(FOOD_VAR),
        }

        let score = state.get("score").and_then(as_integer).unwrap_or(0);
        let game_over = state.get("game_over").and_then(Value::as_bool);
        let status = program_status(state).or_else(|| missing_status(&missing));

        Self {
            frame,
            grid,
            entities,
            score,
            game_over,
            status,
        }
    }

    /// A placeholder pushed before the first frame of a run arrives.
    pub fn loading() -> Self {
        Self {
            frame: 0,
            grid: GridSize::default(),
            entities: Vec::new(),
            score: 0,
            game_over: None,
            status: Some(StatusText {
                title: "Loading".to_string(),
                body: "Starting your program...".to_string(),
                hint: None,
            }),
        }
    }

    /// Returns an entity by name.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Whether the program reports the game as over.
    pub fn is_terminal(&self) -> bool {
        self.game_over == Some(true)
    }
}

impl Entity {
    /// Creates a new entity.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for GridSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn positive_dimension(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(as_integer)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

/// Reads `[x, y]` or `{"x": .., "y": ..}`.
fn as_cell(value: &Value) -> Option<Cell> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some(Cell(as_integer(&items[0])?, as_integer(&items[1])?))
        }
        Value::Object(map) => Some(Cell(as_integer(map.get("x")?)?, as_integer(map.get("y")?)?)),
        _ => None,
    }
}

/// Reads a list of cells, skipping malformed entries. `None` when nothing usable is present.
fn as_cell_list(value: &Value) -> Option<Vec<Cell>> {
    let items = value.as_array()?;
    let cells: Vec<Cell> = items.iter().filter_map(as_cell).collect();
    if cells.is_empty() && !items.is_empty() {
        return None;
    }

    Some(cells)
}

fn snake_cells(value: &Value) -> Option<Vec<Cell>> {
    match value {
        Value::Object(map) => SNAKE_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(as_cell_list)),
        Value::Array(_) => as_cell_list(value),
        _ => None,
    }
}

fn food_cells(value: &Value) -> Option<Vec<Cell>> {
    match value {
        Value::Object(map) => FOOD_SINGLE_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(as_cell))
            .map(|cell| vec![cell])
            .or_else(|| {
                FOOD_MULTI_FIELDS
                    .iter()
                    .find_map(|field| map.get(*field).and_then(as_cell_list))
            }),
        Value::Array(_) => as_cell(value)
            .map(|cell| vec![cell])
            .or_else(|| as_cell_list(value)),
        _ => None,
    }
}

/// Program-provided `message_*` text takes precedence over anything the encoder generates.
fn program_status(state: &ProgramState) -> Option<StatusText> {
    let title = state.get_text("message_title");
    let body = state.get_text("message_text");
    let hint = state.get_text("message_hint");

    if title.is_none() && body.is_none() && hint.is_none() {
        return None;
    }

    Some(StatusText {
        title: title.unwrap_or_default().to_string(),
        body: body.unwrap_or_default().to_string(),
        hint: hint.map(str::to_string),
    })
}

fn missing_status(missing: &[&str]) -> Option<StatusText> {
    if missing.is_empty() {
        return None;
    }

    Some(StatusText {
        title: "Waiting for game state".to_string(),
        body: format!("Not defined yet: {}", missing.join(", ")),
        hint: Some(
            "Create these as module-level variables before calling get_user_direction()."
                .to_string(),
        ),
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
