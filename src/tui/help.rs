//! Help popup: keyboard and mouse controls, grouped by screen.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 84;
const POPUP_HEIGHT: u16 = 28;

struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const MEETINGS: Category = Category {
    title: "MEETINGS",
    shortcuts: &[
        Shortcut {
            key: "Up/Down",
            desc: "Select meeting",
        },
        Shortcut {
            key: "Enter",
            desc: "Join selected meeting",
        },
        Shortcut {
            key: "l",
            desc: "Show share link",
        },
        Shortcut {
            key: "q",
            desc: "Quit",
        },
    ],
};

const JOINING: Category = Category {
    title: "JOINING",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Join with this name",
        },
        Shortcut {
            key: "Esc",
            desc: "Cancel / leave waiting room",
        },
    ],
};

const ROOM: Category = Category {
    title: "ROOM",
    shortcuts: &[
        Shortcut {
            key: "Tab",
            desc: "Focus stage / chat / people",
        },
        Shortcut {
            key: "c",
            desc: "Camera on/off",
        },
        Shortcut {
            key: "m",
            desc: "Mute / unmute yourself",
        },
        Shortcut {
            key: "s",
            desc: "Share screen / stop",
        },
        Shortcut {
            key: "x",
            desc: "Stop sharing / cancel request",
        },
        Shortcut {
            key: "e",
            desc: "End share from outside",
        },
        Shortcut {
            key: "[ ]",
            desc: "Shrink / grow self-view",
        },
        Shortcut {
            key: "Drag ◤",
            desc: "Resize self-view",
        },
        Shortcut {
            key: "L",
            desc: "Leave meeting",
        },
    ],
};

const CHAT: Category = Category {
    title: "CHAT",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Send message",
        },
        Shortcut {
            key: "Up/Down",
            desc: "Select message",
        },
        Shortcut {
            key: "1-5",
            desc: "React 👍 ❤️ 🙏 😂 🎉",
        },
    ],
};

const PEOPLE: Category = Category {
    title: "PEOPLE (host)",
    shortcuts: &[
        Shortcut {
            key: "Up/Down",
            desc: "Select person",
        },
        Shortcut {
            key: "a / d",
            desc: "Admit / deny waiting",
        },
        Shortcut {
            key: "m",
            desc: "Toggle mute",
        },
        Shortcut {
            key: "r",
            desc: "Remove from meeting",
        },
    ],
};

const GENERAL: Category = Category {
    title: "GENERAL",
    shortcuts: &[
        Shortcut {
            key: "F1",
            desc: "Toggle this help",
        },
        Shortcut {
            key: "Ctrl+D",
            desc: "Toggle log pane",
        },
        Shortcut {
            key: "PgUp/PgDn",
            desc: "Scroll log pane",
        },
        Shortcut {
            key: "Ctrl+C",
            desc: "Quit",
        },
    ],
};

pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup = centered_rect(
        POPUP_WIDTH.min(area.width.saturating_sub(2)),
        POPUP_HEIGHT.min(area.height.saturating_sub(2)),
        area,
    );
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " HELP ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);
    frame.render_widget(
        Paragraph::new(column(&[&MEETINGS, &JOINING, &GENERAL])),
        inset(left),
    );
    frame.render_widget(Paragraph::new(column(&[&ROOM, &CHAT, &PEOPLE])), inset(right));
}

fn column(categories: &[&Category]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, cat) in categories.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        for sc in cat.shortcuts {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }
    lines
}

pub(super) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn inset(area: Rect) -> Rect {
    Rect::new(
        area.x + 1,
        area.y + 1,
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    )
}
