use std::time::Instant;

use anyhow::{Context, Result, ensure};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};

use switchex_core::{Feedback, Phase, Snapshot, TaskType, TutorialSnapshot, TutorialStep};

use crate::layout::{self, HEIGHT, WIDTH, palette};
use crate::text::{TextCache, load_system_fonts};

const CURSOR_BLINK_MS: u128 = 500;

/// Software renderer for every experiment screen.
///
/// Draws one full frame per call from a [`Snapshot`]; the canvas is a fixed
/// 900x500 premultiplied pixmap that the caller copies into its surface
/// buffer. Text runs are rasterized once and cached.
pub struct SkiaRenderer {
    canvas: Pixmap,
    regular: TextCache,
    bold: TextCache,
    blink_started: Instant,
}

impl SkiaRenderer {
    pub fn new() -> Result<Self> {
        let fonts = load_system_fonts()?;
        let canvas = Pixmap::new(WIDTH, HEIGHT).context("canvas allocation")?;
        Ok(Self {
            canvas,
            regular: TextCache::new(fonts.regular),
            bold: TextCache::new(fonts.bold),
            blink_started: Instant::now(),
        })
    }

    pub fn render_frame(&mut self, snapshot: &Snapshot, frame: &mut [u8]) -> Result<()> {
        ensure!(
            frame.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, canvas needs {}",
            frame.len(),
            self.canvas.data().len()
        );

        self.canvas.fill(palette::bg());
        match snapshot.phase {
            Phase::Start => self.draw_start(),
            Phase::Tutorial => self.draw_tutorial(snapshot),
            Phase::Countdown => self.draw_countdown(snapshot),
            Phase::Running => self.draw_running(snapshot),
            Phase::Break => self.draw_break(snapshot),
            Phase::Done => self.draw_done(),
        }

        frame.copy_from_slice(self.canvas.data());
        Ok(())
    }

    fn draw_start(&mut self) {
        let cx = WIDTH as f32 / 2.0;
        self.text_centered("Task-Switching Experiment (9 Blocks)", 32.0, palette::ink(), cx, 80.0);

        let lines = [
            "You will switch between 2 tasks:",
            "Task 1: Count total occurrences of specified digits in a string",
            "Task 2: Count total occurrences of digits NOT specified in a string",
            "Goal: Complete the task correctly as many times as possible.",
            "Type your answer and press ENTER to submit.",
        ];
        for (i, line) in lines.iter().enumerate() {
            self.text_centered(line, 24.0, palette::ink(), cx, 150.0 + i as f32 * 40.0);
        }

        let tutorial = layout::tutorial_button();
        fill_rounded(&mut self.canvas, tutorial, 10.0, palette::accent());
        self.text_centered(
            "TUTORIAL",
            32.0,
            palette::panel(),
            tutorial.x() + tutorial.width() / 2.0,
            tutorial.y() + tutorial.height() / 2.0,
        );

        let start = layout::start_button();
        fill_rounded(&mut self.canvas, start, 10.0, palette::positive());
        self.text_centered(
            "START",
            32.0,
            palette::panel(),
            start.x() + start.width() / 2.0,
            start.y() + start.height() / 2.0,
        );
    }

    fn draw_countdown(&mut self, snapshot: &Snapshot) {
        let remaining = snapshot.phase_remaining.as_secs_f32().ceil() as u64;
        self.text_centered(
            &format!("Starting in {remaining}"),
            32.0,
            palette::ink(),
            WIDTH as f32 / 2.0,
            HEIGHT as f32 / 2.0,
        );
    }

    fn draw_running(&mut self, snapshot: &Snapshot) {
        let cx = WIDTH as f32 / 2.0;

        self.text_top_right(
            &format!(
                "Block {} / {}",
                snapshot.condition_index + 1,
                snapshot.condition_total
            ),
            24.0,
            palette::subtle(),
            WIDTH as f32 - 20.0,
            12.0,
        );

        match snapshot.task {
            TaskType::CountTargets => {
                self.text_centered(
                    "Count how many times target digits appear:",
                    32.0,
                    palette::ink(),
                    cx,
                    80.0,
                );
            }
            TaskType::CountNonTargets => {
                self.emphasis_line(
                    "Count digits ",
                    "NOT",
                    " in the target set:",
                    32.0,
                    cx,
                    80.0,
                );
            }
        }

        self.text_centered(
            &format_targets(&snapshot.stimulus.targets),
            32.0,
            palette::ink(),
            cx,
            140.0,
        );
        self.text_centered(&snapshot.stimulus.digits, 32.0, palette::ink(), cx, 200.0);

        self.draw_input_box(240.0, &snapshot.input);

        if snapshot.switch_flash {
            let pixmap = self.bold.get("TASK SWITCH!", 32.0, palette::accent());
            blit_centered(&mut self.canvas, &pixmap, cx, 330.0);
        }

        self.draw_progress_bar(snapshot);
    }

    fn draw_break(&mut self, snapshot: &Snapshot) {
        let cx = WIDTH as f32 / 2.0;
        self.text_centered("Break Time", 32.0, palette::ink(), cx, 180.0);

        let remaining = snapshot.phase_remaining.as_secs_f32().ceil() as u64;
        self.text_centered(
            &format!("Next block starts in {remaining} seconds"),
            32.0,
            palette::subtle(),
            cx,
            240.0,
        );
        self.text_centered(
            &format!(
                "Completed {} of {} blocks",
                snapshot.condition_index, snapshot.condition_total
            ),
            24.0,
            palette::subtle(),
            cx,
            300.0,
        );
    }

    fn draw_done(&mut self) {
        let cx = WIDTH as f32 / 2.0;
        let cy = HEIGHT as f32 / 2.0;
        self.text_centered("Experiment Complete", 32.0, palette::ink(), cx, cy - 30.0);
        self.text_centered(
            "Thank you for participating! You may close this window.",
            24.0,
            palette::subtle(),
            cx,
            cy + 20.0,
        );
    }

    fn draw_tutorial(&mut self, snapshot: &Snapshot) {
        let Some(tutorial) = &snapshot.tutorial else {
            return;
        };
        match tutorial.step {
            TutorialStep::ExplainTargets => self.draw_tutorial_explanation(
                "Tutorial - Task 1",
                &[
                    "You will see a string of digits and a set of target digits.",
                    "Count how many times any of the target digits appear in the string.",
                    "Example: String = 3 8 1 4 3 2 7 1 9 0   Targets: {1, 3}",
                    "Answer: 4  (two 3s and two 1s)",
                    "",
                    "Press SPACE to try a practice round.",
                ],
            ),
            TutorialStep::ExplainNonTargets => self.draw_tutorial_explanation(
                "Tutorial - Task 2",
                &[
                    "This time, count the digits NOT in the target set.",
                    "Tip: count the targets and subtract from 10.",
                    "Example: String = 3 8 1 4 3 2 7 1 9 0   Targets: {1, 3}",
                    "Answer: 6  (10 total minus 4 targets)",
                    "",
                    "Press SPACE to try a practice round.",
                ],
            ),
            TutorialStep::PracticeTargets | TutorialStep::PracticeNonTargets => {
                self.draw_tutorial_practice(tutorial);
            }
        }
    }

    fn draw_tutorial_explanation(&mut self, title: &str, lines: &[&str]) {
        let cx = WIDTH as f32 / 2.0;
        self.text_centered(title, 32.0, palette::ink(), cx, 60.0);
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            self.text_centered(line, 24.0, palette::ink(), cx, 140.0 + i as f32 * 35.0);
        }
    }

    fn draw_tutorial_practice(&mut self, tutorial: &TutorialSnapshot) {
        let cx = WIDTH as f32 / 2.0;

        match tutorial.task {
            TaskType::CountTargets => {
                self.text_centered(
                    "Practice - Count target digits:",
                    32.0,
                    palette::ink(),
                    cx,
                    60.0,
                );
            }
            TaskType::CountNonTargets => {
                self.emphasis_line("Practice - Count digits ", "NOT", " in targets:", 32.0, cx, 60.0);
            }
        }

        if let Some(stimulus) = &tutorial.stimulus {
            self.text_centered(
                &format_targets(&stimulus.targets),
                32.0,
                palette::ink(),
                cx,
                120.0,
            );
            self.text_centered(&stimulus.digits, 32.0, palette::ink(), cx, 180.0);
        }

        self.draw_input_box(220.0, &tutorial.input);

        match tutorial.feedback {
            Feedback::Correct => {
                self.text_centered(
                    "Correct! Press SPACE to continue.",
                    32.0,
                    palette::positive(),
                    cx,
                    330.0,
                );
            }
            Feedback::Incorrect => {
                self.text_centered("Incorrect. Try again.", 32.0, palette::negative(), cx, 330.0);
            }
            Feedback::None => {}
        }

        self.text_centered(
            "Type your answer and press ENTER.",
            24.0,
            palette::subtle(),
            cx,
            400.0,
        );
    }

    /// White rounded entry field with the typed answer and a blinking caret.
    fn draw_input_box(&mut self, top: f32, input: &str) {
        let rect = Rect::from_xywh(WIDTH as f32 / 2.0 - 60.0, top, 120.0, 50.0).unwrap();
        fill_rounded(&mut self.canvas, rect, 8.0, palette::panel());
        stroke_rounded(&mut self.canvas, rect, 8.0, palette::outline(), 2.0);

        let center_x = rect.x() + rect.width() / 2.0;
        let center_y = rect.y() + rect.height() / 2.0;
        let mut cursor_x = center_x;
        if !input.is_empty() {
            let pixmap = self.regular.get(input, 32.0, palette::ink());
            blit_centered(&mut self.canvas, &pixmap, center_x, center_y);
            cursor_x = center_x + pixmap.width() as f32 / 2.0 + 2.0;
        }

        if self.cursor_visible() {
            if let Some(caret) = Rect::from_xywh(cursor_x, center_y - 15.0, 2.0, 30.0) {
                fill_rect(&mut self.canvas, caret, palette::ink());
            }
        }
    }

    fn draw_progress_bar(&mut self, snapshot: &Snapshot) {
        let bar_x = 50.0;
        let bar_y = HEIGHT as f32 - 60.0;
        let bar_width = WIDTH as f32 - 100.0;
        let bar_height = 16.0;

        let bar = Rect::from_xywh(bar_x, bar_y, bar_width, bar_height).unwrap();
        fill_rounded(&mut self.canvas, bar, 8.0, palette::outline());

        let progress =
            (snapshot.block_elapsed.as_secs_f32() / snapshot.block_total.as_secs_f32()).min(1.0);
        let filled = (bar_width * progress).floor();
        if filled >= 1.0 {
            if let Some(fill) = Rect::from_xywh(bar_x, bar_y, filled, bar_height) {
                fill_rounded(&mut self.canvas, fill, 8.0, palette::accent());
            }
        }

        // Tick marks where the task rule will flip.
        let Some(condition) = snapshot.condition else {
            return;
        };
        let marks = snapshot.block_total.as_secs() / condition.interval_secs;
        for i in 1..marks {
            let mark_x = bar_x + (i as f32 / marks as f32) * bar_width;
            if let Some(mark) = Rect::from_xywh(mark_x, bar_y - 5.0, 2.0, bar_height + 10.0) {
                fill_rect(&mut self.canvas, mark, palette::ink());
            }
        }
    }

    /// Regular text / bold colored emphasis / regular text, one line.
    fn emphasis_line(&mut self, lead: &str, emphasis: &str, tail: &str, px: f32, cx: f32, cy: f32) {
        let lead_pm = self.regular.get(lead, px, palette::ink());
        let emphasis_pm = self.bold.get(emphasis, px, palette::negative());
        let tail_pm = self.regular.get(tail, px, palette::ink());

        let total = (lead_pm.width() + emphasis_pm.width() + tail_pm.width()) as f32;
        let mut x = cx - total / 2.0;
        for pixmap in [&lead_pm, &emphasis_pm, &tail_pm] {
            blit(
                &mut self.canvas,
                pixmap,
                x as i32,
                (cy - pixmap.height() as f32 / 2.0) as i32,
            );
            x += pixmap.width() as f32;
        }
    }

    fn text_centered(&mut self, text: &str, px: f32, color: tiny_skia::Color, cx: f32, cy: f32) {
        let pixmap = self.regular.get(text, px, color);
        blit_centered(&mut self.canvas, &pixmap, cx, cy);
    }

    fn text_top_right(&mut self, text: &str, px: f32, color: tiny_skia::Color, right: f32, top: f32) {
        let pixmap = self.regular.get(text, px, color);
        blit(
            &mut self.canvas,
            &pixmap,
            (right - pixmap.width() as f32) as i32,
            top as i32,
        );
    }

    fn cursor_visible(&self) -> bool {
        (self.blink_started.elapsed().as_millis() / CURSOR_BLINK_MS) % 2 == 0
    }
}

fn format_targets(targets: &[u8]) -> String {
    let inner = targets
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Targets: {{{inner}}}")
}

fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let (x, y, w, h) = (rect.x(), rect.y(), rect.width(), rect.height());
    let r = radius.min(w / 2.0).min(h / 2.0);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

fn fill_rounded(canvas: &mut Pixmap, rect: Rect, radius: f32, color: tiny_skia::Color) {
    let Some(path) = rounded_rect_path(rect, radius) else {
        return;
    };
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(color);
    canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn stroke_rounded(canvas: &mut Pixmap, rect: Rect, radius: f32, color: tiny_skia::Color, width: f32) {
    let Some(path) = rounded_rect_path(rect, radius) else {
        return;
    };
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(color);
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn fill_rect(canvas: &mut Pixmap, rect: Rect, color: tiny_skia::Color) {
    let mut paint = Paint::default();
    paint.set_color(color);
    canvas.fill_rect(rect, &paint, Transform::identity(), None);
}

fn blit_centered(canvas: &mut Pixmap, pixmap: &Pixmap, cx: f32, cy: f32) {
    blit(
        canvas,
        pixmap,
        (cx - pixmap.width() as f32 / 2.0) as i32,
        (cy - pixmap.height() as f32 / 2.0) as i32,
    );
}

/// Premultiplied source-over blit with clipping at the canvas edges.
fn blit(canvas: &mut Pixmap, pixmap: &Pixmap, x: i32, y: i32) {
    let cw = canvas.width() as i32;
    let ch = canvas.height() as i32;
    let pw = pixmap.width() as i32;
    let ph = pixmap.height() as i32;

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + pw).min(cw);
    let y1 = (y + ph).min(ch);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let src = pixmap.data();
    let dst = canvas.data_mut();
    for row in y0..y1 {
        let src_start = (((row - y) * pw) + (x0 - x)) as usize * 4;
        let dst_start = ((row * cw) + x0) as usize * 4;
        let n = (x1 - x0) as usize * 4;
        let src_row = &src[src_start..src_start + n];
        let dst_row = &mut dst[dst_start..dst_start + n];

        for i in (0..n).step_by(4) {
            let sa = src_row[i + 3] as u32;
            if sa == 0 {
                continue;
            }
            if sa == 255 {
                dst_row[i..i + 4].copy_from_slice(&src_row[i..i + 4]);
                continue;
            }
            let inv = 255 - sa;
            for c in 0..4 {
                let s = src_row[i + c] as u32;
                let d = dst_row[i + c] as u32;
                dst_row[i + c] = (s + (d * inv + 127) / 255) as u8;
            }
        }
    }
}
