use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn bind(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::raw(desc),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        bind("q / Ctrl-C", "Quit"),
        bind("n / Right ", "Next step (runs the analysis on the validation step)"),
        bind("b / Left  ", "Previous step"),
        bind("1-6       ", "Jump to a reached step"),
        bind("e         ", "Export CSV"),
        bind("i         ", "Export PNG"),
        bind("d         ", "Export document"),
        bind("Esc       ", "Dismiss notification / close help"),
        bind("?         ", "Toggle this help"),
        Line::from(""),
        Line::from("Variables step:"),
        bind("Up/Down   ", "Highlight a column"),
        bind("t         ", "Use highlighted column as target"),
        bind("p / Space ", "Toggle highlighted column as predictor"),
        bind("z         ", "Toggle highlighted column as instrument"),
        Line::from(""),
        Line::from("Settings step:"),
        bind("+ / -     ", "Adjust lag count (within the shown bound)"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
