use ratatui::style;

pub struct LyricStyles {
    pub before: style::Style,
    pub current: style::Style,
    pub after: style::Style,
    pub title: style::Style,
    pub hint: style::Style,
    pub gauge: style::Style,
    pub alert: style::Style,
}

impl Default for LyricStyles {
    fn default() -> Self {
        Self {
            before: style::Style::default()
                .add_modifier(style::Modifier::ITALIC | style::Modifier::DIM),
            current: style::Style::default()
                .fg(style::Color::Green)
                .add_modifier(style::Modifier::BOLD),
            after: style::Style::default(),
            title: style::Style::default().add_modifier(style::Modifier::BOLD),
            hint: style::Style::default().add_modifier(style::Modifier::DIM),
            gauge: style::Style::default().fg(style::Color::Green),
            alert: style::Style::default()
                .fg(style::Color::Red)
                .add_modifier(style::Modifier::BOLD),
        }
    }
}
