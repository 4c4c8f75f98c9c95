//! Terminal glyphs used by the command line tools.

use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// A green checkmark for successful operations.
pub static CHECKMARK: LazyLock<String> = LazyLock::new(|| format!("{}", console::style("✓").green()));

/// A red cross for failed operations.
pub static CROSS: LazyLock<String> = LazyLock::new(|| format!("{}", console::style("✗").red()));

/// A dimmed bar used to prefix relayed program output.
pub static OUTPUT_BAR: LazyLock<String> = LazyLock::new(|| format!("{}", console::style("│").dim()));
