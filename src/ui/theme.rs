//! Colour roles for catalog output

use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    /// Left-hand labels of `key: value` lines
    pub label: Style,
    /// Stored type names
    pub type_name: Style,
    /// Numeric catalog ids
    pub id: Style,
}

impl Theme {
    /// Colours only when stdout is a terminal and `NO_COLOR`/`CLICOLOR` allow it
    pub fn detect() -> Self {
        Self::for_terminal(console::Term::stdout().is_term() && console::colors_enabled())
    }

    pub fn for_terminal(colored: bool) -> Self {
        if colored {
            Self {
                header: Style::new().cyan().bold(),
                success: Style::new().green().bold(),
                error: Style::new().red().bold(),
                warn: Style::new().yellow().bold(),
                info: Style::new().magenta(),
                label: Style::new().bright_black(),
                type_name: Style::new().blue().bold(),
                id: Style::new().bright_black().italic(),
            }
        } else {
            Self {
                header: Style::new(),
                success: Style::new(),
                error: Style::new(),
                warn: Style::new(),
                info: Style::new(),
                label: Style::new(),
                type_name: Style::new(),
                id: Style::new(),
            }
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
