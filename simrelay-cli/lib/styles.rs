use clap::builder::{styling::AnsiColor, Styles};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Terminal styles for CLI text.
pub trait AnsiStyles {
    /// Styles text as a header.
    fn header(&self) -> String;

    /// Styles text as a literal, e.g. a command or value.
    fn literal(&self) -> String;

    /// Styles text as a placeholder.
    fn placeholder(&self) -> String;

    /// Styles text as an error.
    fn error(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Styles for clap help output.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Yellow.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default().bold())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T: AsRef<str>> AnsiStyles for T {
    fn header(&self) -> String {
        console::style(self.as_ref()).yellow().bold().to_string()
    }

    fn literal(&self) -> String {
        console::style(self.as_ref()).green().bold().to_string()
    }

    fn placeholder(&self) -> String {
        console::style(self.as_ref()).cyan().to_string()
    }

    fn error(&self) -> String {
        console::style(self.as_ref()).red().bold().to_string()
    }
}
