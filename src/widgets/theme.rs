use std::{env, sync::OnceLock, time::Duration};

use ratatui::style::Color;

use segscope::settings::ThemePreference;

const THEME_ENV: &str = "SEGSCOPE_THEME";
const LUMA_THRESHOLD: f32 = 0.6;
// Some terminals report noisy or transient luma right after startup; take a few
// samples and use the median to avoid a single bad read flipping the theme.
const LUMA_SAMPLES: usize = 5;
const LUMA_SAMPLE_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeKind {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    kind: ThemeKind,
    bg: Color,
    panel_bg: Color,
    panel_bg_alt: Color,
    text: Color,
    text_muted: Color,
    accent: Color,
    accent_alt: Color,
    border: Color,
    selection_bg: Color,
    selection_fg: Color,
    success: Color,
    warning: Color,
    error: Color,
}

impl Theme {
    /// Pick the palette: `SEGSCOPE_THEME` wins, then the saved preference,
    /// then the terminal background.
    pub fn resolve(preference: ThemePreference) -> Self {
        let preference = env::var(THEME_ENV)
            .ok()
            .and_then(|value| value.parse::<ThemePreference>().ok())
            .unwrap_or(preference);
        match preference {
            ThemePreference::Dark => Self::dark(),
            ThemePreference::Light => Self::light(),
            ThemePreference::Auto => Self::detect(),
        }
    }

    fn detect() -> Self {
        static DETECTED: OnceLock<ThemeKind> = OnceLock::new();
        let kind = *DETECTED.get_or_init(|| match detect_terminal_luma() {
            Some(luma) if luma > LUMA_THRESHOLD => ThemeKind::Light,
            _ => ThemeKind::Dark,
        });
        Self::for_kind(kind)
    }

    pub fn for_kind(kind: ThemeKind) -> Self {
        match kind {
            ThemeKind::Dark => Self::dark(),
            ThemeKind::Light => Self::light(),
        }
    }

    pub fn kind(&self) -> ThemeKind {
        self.kind
    }

    /// The opposite palette, for the dark/light toggle.
    pub fn toggled(&self) -> Self {
        match self.kind {
            ThemeKind::Dark => Self::light(),
            ThemeKind::Light => Self::dark(),
        }
    }

    pub fn preference(&self) -> ThemePreference {
        match self.kind {
            ThemeKind::Dark => ThemePreference::Dark,
            ThemeKind::Light => ThemePreference::Light,
        }
    }

    /// Slate and indigo, for dark terminals.
    pub fn dark() -> Self {
        Self {
            kind: ThemeKind::Dark,
            bg: Color::Rgb(15, 17, 26),
            panel_bg: Color::Rgb(21, 24, 36),
            panel_bg_alt: Color::Rgb(26, 30, 44),
            text: Color::Rgb(226, 232, 240),
            text_muted: Color::Rgb(148, 158, 180),
            accent: Color::Rgb(129, 140, 248),
            accent_alt: Color::Rgb(45, 212, 191),
            border: Color::Rgb(61, 68, 96),
            selection_bg: Color::Rgb(49, 46, 129),
            selection_fg: Color::Rgb(238, 242, 255),
            success: Color::Rgb(74, 222, 128),
            warning: Color::Rgb(251, 191, 36),
            error: Color::Rgb(248, 113, 113),
        }
    }

    pub fn light() -> Self {
        Self {
            kind: ThemeKind::Light,
            bg: Color::Rgb(248, 250, 252),
            panel_bg: Color::Rgb(255, 255, 255),
            panel_bg_alt: Color::Rgb(241, 245, 249),
            text: Color::Rgb(30, 41, 59),
            text_muted: Color::Rgb(100, 116, 139),
            accent: Color::Rgb(67, 56, 202),
            accent_alt: Color::Rgb(13, 148, 136),
            border: Color::Rgb(203, 213, 225),
            selection_bg: Color::Rgb(224, 231, 255),
            selection_fg: Color::Rgb(30, 27, 75),
            success: Color::Rgb(22, 163, 74),
            warning: Color::Rgb(180, 83, 9),
            error: Color::Rgb(220, 38, 38),
        }
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn panel_bg(&self) -> Color {
        self.panel_bg
    }

    pub fn panel_bg_alt(&self) -> Color {
        self.panel_bg_alt
    }

    pub fn text(&self) -> Color {
        self.text
    }

    pub fn text_muted(&self) -> Color {
        self.text_muted
    }

    pub fn accent(&self) -> Color {
        self.accent
    }

    pub fn accent_alt(&self) -> Color {
        self.accent_alt
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn selection_bg(&self) -> Color {
        self.selection_bg
    }

    pub fn selection_fg(&self) -> Color {
        self.selection_fg
    }

    pub fn success(&self) -> Color {
        self.success
    }

    pub fn warning(&self) -> Color {
        self.warning
    }

    pub fn error(&self) -> Color {
        self.error
    }
}

fn detect_terminal_luma() -> Option<f32> {
    let mut samples = Vec::with_capacity(LUMA_SAMPLES);
    for attempt in 0..LUMA_SAMPLES {
        if let Ok(luma) = terminal_light::luma()
            && luma.is_finite()
        {
            samples.push(luma);
        }
        if attempt + 1 < LUMA_SAMPLES {
            std::thread::sleep(LUMA_SAMPLE_DELAY);
        }
    }

    if samples.is_empty() {
        return None;
    }

    Some(median_luma(&mut samples))
}

fn median_luma(samples: &mut [f32]) -> f32 {
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len().is_multiple_of(2) {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_luma_odd() {
        let mut samples = [0.9_f32, 0.4_f32, 0.2_f32];
        let median = median_luma(&mut samples);
        assert!((median - 0.4).abs() < 1e-6);
    }

    #[test]
    fn median_luma_even() {
        let mut samples = [0.2_f32, 0.8_f32, 0.4_f32, 0.6_f32];
        let median = median_luma(&mut samples);
        assert!((median - 0.5).abs() < 1e-6);
    }

    #[test]
    fn toggle_flips_kind_and_preference() {
        let dark = Theme::dark();
        let light = dark.toggled();
        assert_eq!(light.kind(), ThemeKind::Light);
        assert_eq!(light.preference(), ThemePreference::Light);
        assert_eq!(light.toggled().kind(), ThemeKind::Dark);
    }
}
