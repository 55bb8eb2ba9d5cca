use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub mode: ThemeMode,
    pub bg_page: Color,
    pub bg_elevated: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_tertiary: Color,
    pub border_default: Color,
    pub accent: Color,
    pub success: Color,
    pub danger: Color,
    pub warning: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg_page: Color::Rgb(18, 18, 22),
            bg_elevated: Color::Rgb(32, 32, 40),
            text_primary: Color::Rgb(224, 224, 230),
            text_secondary: Color::Rgb(160, 160, 170),
            text_tertiary: Color::Rgb(110, 110, 122),
            border_default: Color::Rgb(58, 58, 68),
            accent: Color::Rgb(122, 162, 247),
            success: Color::Rgb(130, 200, 120),
            danger: Color::Rgb(230, 100, 100),
            warning: Color::Rgb(224, 175, 104),
        }
    }

    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg_page: Color::Rgb(248, 248, 250),
            bg_elevated: Color::Rgb(232, 232, 238),
            text_primary: Color::Rgb(32, 32, 40),
            text_secondary: Color::Rgb(90, 90, 100),
            text_tertiary: Color::Rgb(140, 140, 150),
            border_default: Color::Rgb(200, 200, 210),
            accent: Color::Rgb(52, 100, 210),
            success: Color::Rgb(40, 140, 60),
            danger: Color::Rgb(190, 50, 50),
            warning: Color::Rgb(176, 120, 30),
        }
    }

    pub fn named(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }
}
