use ratatui::style::{Color, Modifier, Style};

/// Colour scheme, remembered across sessions under the `theme` preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn from_pref(value: Option<&str>) -> Self {
        match value {
            Some("light") => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn base(&self) -> Style {
        match self {
            Theme::Dark => Style::default().fg(Color::White).bg(Color::Black),
            Theme::Light => Style::default().fg(Color::Black).bg(Color::White),
        }
    }

    pub fn user(&self) -> Style {
        let color = match self {
            Theme::Dark => Color::Cyan,
            Theme::Light => Color::Blue,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn assistant(&self) -> Style {
        let color = match self {
            Theme::Dark => Color::Yellow,
            Theme::Light => Color::Magenta,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    }

    pub fn heading(&self) -> Style {
        self.assistant().add_modifier(Modifier::UNDERLINED)
    }

    pub fn code(&self) -> Style {
        match self {
            Theme::Dark => Style::default().fg(Color::Green),
            Theme::Light => Style::default().fg(Color::Rgb(0, 110, 0)),
        }
    }

    pub fn link(&self) -> Style {
        Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED)
    }

    pub fn muted(&self) -> Style {
        match self {
            Theme::Dark => Style::default().fg(Color::DarkGray),
            Theme::Light => Style::default().fg(Color::Gray),
        }
    }

    pub fn accent(&self) -> Color {
        match self {
            Theme::Dark => Color::Cyan,
            Theme::Light => Color::Blue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_pref_falls_back_to_dark() {
        assert_eq!(Theme::from_pref(None), Theme::Dark);
        assert_eq!(Theme::from_pref(Some("solarized")), Theme::Dark);
        assert_eq!(Theme::from_pref(Some(Theme::Light.as_str())), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
