//! Page layout for task reports.
//!
//! The layout works in millimetres from the bottom-left corner of an A4
//! page, the same coordinate space the PDF writer uses. Blocks are measured
//! before they are placed so a block that does not fit starts a new page;
//! only blocks taller than a page are split.

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 18.0;
pub const TOP_MM: f32 = PAGE_HEIGHT_MM - 22.0;
pub const BOTTOM_MM: f32 = 20.0;

const LABEL_WIDTH_MM: f32 = 36.0;
const INDENT_MM: f32 = 5.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING_MM: f32 = 5.0;
const DETAIL_LEADING_MM: f32 = 4.5;
const SECTION_SIZE: f32 = 12.0;
const TITLE_SIZE: f32 = 18.0;
const PT_TO_MM: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        weight: FontWeight,
        text: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[cfg(test)]
impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Rule { .. } => None,
        })
    }
}

/// One laid-out line inside a block, relative to the block's left edge.
struct Line {
    offset: f32,
    size: f32,
    weight: FontWeight,
    text: String,
    leading: f32,
}

pub struct Layout {
    pages: Vec<Page>,
    cursor: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            cursor: TOP_MM,
        }
    }

    pub fn content_width() -> f32 {
        PAGE_WIDTH_MM - 2.0 * MARGIN_MM
    }

    pub fn title(&mut self, text: &str) {
        let lines = wrap_text(text, Self::content_width(), TITLE_SIZE, FontWeight::Bold);
        let block: Vec<Line> = lines
            .into_iter()
            .map(|text| Line {
                offset: 0.0,
                size: TITLE_SIZE,
                weight: FontWeight::Bold,
                text,
                leading: 8.0,
            })
            .collect();
        self.place(block);
        self.space(2.0);
    }

    /// Section heading with a rule underneath. Kept on the same page as the
    /// first line that follows it.
    pub fn section(&mut self, text: &str) {
        self.ensure_space(3.0 + BODY_LEADING_MM + 6.0 + BODY_LEADING_MM);
        self.space(3.0);
        self.push_text(MARGIN_MM, SECTION_SIZE, FontWeight::Bold, text);
        self.cursor -= 2.0;
        let y = self.cursor;
        self.current().ops.push(DrawOp::Rule {
            x1: MARGIN_MM,
            x2: PAGE_WIDTH_MM - MARGIN_MM,
            y,
        });
        self.cursor -= 4.0;
    }

    /// Bold label in a fixed column with a wrapped value beside it.
    pub fn field(&mut self, label: &str, value: &str) {
        let value_width = Self::content_width() - LABEL_WIDTH_MM;
        let mut block = vec![];
        for (index, text) in wrap_text(value, value_width, BODY_SIZE, FontWeight::Regular)
            .into_iter()
            .enumerate()
        {
            if index == 0 {
                block.push(Line {
                    offset: 0.0,
                    size: BODY_SIZE,
                    weight: FontWeight::Bold,
                    text: label.to_string(),
                    leading: 0.0,
                });
            }
            block.push(Line {
                offset: LABEL_WIDTH_MM,
                size: BODY_SIZE,
                weight: FontWeight::Regular,
                text,
                leading: BODY_LEADING_MM,
            });
        }
        self.place(block);
    }

    /// Free text, one output line per source line. Blank lines are kept.
    pub fn paragraph(&mut self, text: &str) {
        for source_line in text.lines() {
            if source_line.trim().is_empty() {
                self.ensure_space(BODY_LEADING_MM);
                self.cursor -= BODY_LEADING_MM;
                continue;
            }

            for line in wrap_text(
                source_line,
                Self::content_width(),
                BODY_SIZE,
                FontWeight::Regular,
            ) {
                self.place(vec![Line {
                    offset: 0.0,
                    size: BODY_SIZE,
                    weight: FontWeight::Regular,
                    text: line,
                    leading: BODY_LEADING_MM,
                }]);
            }
        }
    }

    /// Numbered entry: a bold heading followed by indented detail lines.
    /// An entry that fits on a page is moved whole to the next one.
    pub fn entry(&mut self, heading: &str, details: &[String]) {
        let mut block: Vec<Line> = wrap_text(
            heading,
            Self::content_width(),
            BODY_SIZE,
            FontWeight::Bold,
        )
        .into_iter()
        .map(|text| Line {
            offset: 0.0,
            size: BODY_SIZE,
            weight: FontWeight::Bold,
            text,
            leading: BODY_LEADING_MM,
        })
        .collect();

        for detail in details {
            block.extend(
                wrap_text(
                    detail,
                    Self::content_width() - INDENT_MM,
                    9.0,
                    FontWeight::Regular,
                )
                .into_iter()
                .map(|text| Line {
                    offset: INDENT_MM,
                    size: 9.0,
                    weight: FontWeight::Regular,
                    text,
                    leading: DETAIL_LEADING_MM,
                }),
            );
        }

        self.place(block);
        self.space(2.0);
    }

    pub fn space(&mut self, height: f32) {
        self.cursor -= height;
    }

    pub fn finish(self) -> Vec<Page> {
        self.pages
    }

    /// Keeps a block on one page when it fits on one; taller blocks flow
    /// line by line across pages.
    fn place(&mut self, block: Vec<Line>) {
        let height: f32 = block.iter().map(|line| line.leading).sum();
        let fits_on_page = height <= TOP_MM - BOTTOM_MM;
        if fits_on_page {
            self.ensure_space(height);
        }

        for line in block {
            if !fits_on_page {
                // A zero-leading line shares its row with the next one.
                self.ensure_space(line.leading.max(BODY_LEADING_MM));
            }
            self.push_text(MARGIN_MM + line.offset, line.size, line.weight, &line.text);
            self.cursor += BODY_LEADING_MM - line.leading;
        }
    }

    fn push_text(&mut self, x: f32, size: f32, weight: FontWeight, text: &str) {
        let y = self.cursor;
        self.current().ops.push(DrawOp::Text {
            x,
            y,
            size,
            weight,
            text: text.to_string(),
        });
        self.cursor -= BODY_LEADING_MM;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < BOTTOM_MM && !self.current_is_empty() {
            self.pages.push(Page::default());
            self.cursor = TOP_MM;
        }
    }

    fn current_is_empty(&self) -> bool {
        self.pages
            .last()
            .map(|page| page.ops.is_empty())
            .unwrap_or(true)
    }

    fn current(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

/// Approximate Helvetica advance width in em units.
fn glyph_width(character: char) -> f32 {
    match character {
        ' ' => 0.278,
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' | 'f' | 't' | 'r' | 'I' => 0.28,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.83,
        character if character.is_uppercase() => 0.67,
        _ => 0.556,
    }
}

pub fn text_width(text: &str, size: f32, weight: FontWeight) -> f32 {
    let units: f32 = text.chars().map(glyph_width).sum();
    let factor = match weight {
        FontWeight::Regular => 1.0,
        FontWeight::Bold => 1.05,
    };
    units * size * PT_TO_MM * factor
}

/// Greedy word wrap that keeps the source line breaks. Words wider than a
/// full line are split by character.
pub fn wrap_text(text: &str, max_width: f32, size: f32, weight: FontWeight) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_line(line, max_width, size, weight))
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

fn wrap_line(text: &str, max_width: f32, size: f32, weight: FontWeight) -> Vec<String> {
    let mut lines = vec![];
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if text_width(&candidate, size, weight) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if text_width(word, size, weight) <= max_width {
            current = word.to_string();
            continue;
        }

        for character in word.chars() {
            current.push(character);
            if text_width(&current, size, weight) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(character);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}
