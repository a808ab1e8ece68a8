//! High level keyboard and mouse automation.
//!
//! [`HidController`] tracks held keys, mouse buttons and the logical cursor
//! position, and turns typing, clicking, moving, scrolling and dragging into
//! paced sequences of HID reports. Soft failures of individual reports are
//! logged and the sequence carries on; hard failures abort it.

use std::{thread, time::Duration, time::Instant};

use log::{debug, warn};

use crate::{
    connection::{Connection, ConnectionError, Outcome, Transport},
    packets::{
        hid::{AbsoluteMouseReport, KeyReport, Modifiers, MouseButtons},
        info::DeviceInfo,
    },
};

pub mod keymap;

/// Cap on wheel reports sent by a single scroll.
const MAX_SCROLL_STEPS: u32 = 150;

/// Distance in logical pixels covered by one relative report while dragging.
const DRAG_STEP: f64 = 4.62;

/// Timing between reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// Pause after every report.
    pub dwell: Duration,

    /// How long [`HidController::press`] holds a key or button.
    pub key_hold: Duration,

    /// Pause between the clicks of a multi-click.
    pub double_click_interval: Duration,

    /// Interval between the steps of a smooth movement.
    pub move_interval: Duration,

    /// Wheel reports sent per logical scroll click.
    pub scroll_multiplier: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            dwell: Duration::ZERO,
            key_hold: Duration::from_millis(50),
            double_click_interval: Duration::from_millis(80),
            move_interval: Duration::from_millis(40),
            scroll_multiplier: 3,
        }
    }
}

impl Pacing {
    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            dwell: Duration::ZERO,
            key_hold: Duration::ZERO,
            double_click_interval: Duration::ZERO,
            move_interval: Duration::ZERO,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
    Middle,
}

impl Button {
    /// Parses `left`, `right` or `middle`, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }

    fn mask(self) -> MouseButtons {
        match self {
            Self::Left => MouseButtons::LEFT,
            Self::Right => MouseButtons::RIGHT,
            Self::Middle => MouseButtons::MIDDLE,
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

fn log_soft_failure(outcome: Outcome<()>) {
    if let Err(failure) = outcome {
        warn!("HID report was not acknowledged: {}", failure);
    }
}

/// Keyboard and mouse automation over a [`Connection`].
///
/// The cursor position is tracked in logical screen pixels and mapped onto the
/// chip's absolute grid. Call [`reset`](Self::reset) first so that the tracked
/// position matches the real cursor.
#[derive(Debug)]
pub struct HidController<T: Transport> {
    connection: Connection<T>,
    width: u32,
    height: u32,
    pub pacing: Pacing,
    buttons: MouseButtons,
    x: f64,
    y: f64,
    held_modifiers: Modifiers,
    pressed_keys: Vec<u8>,
}

impl<T: Transport> HidController<T> {
    /// Creates a controller for a `width` x `height` screen. Dimensions below
    /// 2 are raised to 2.
    pub fn new(connection: Connection<T>, width: u32, height: u32) -> Self {
        Self {
            connection,
            width: width.max(2),
            height: height.max(2),
            pacing: Pacing::default(),
            buttons: MouseButtons::empty(),
            x: 0.0,
            y: 0.0,
            held_modifiers: Modifiers::empty(),
            pressed_keys: Vec::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    pub fn into_connection(self) -> Connection<T> {
        self.connection
    }

    /// Tracked cursor position in logical pixels.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn device_info(&mut self) -> Result<Outcome<DeviceInfo>, ConnectionError> {
        self.connection.get_info()
    }

    /// Maps logical pixel coordinates onto the chip's `0..=4095` grid.
    pub fn to_absolute(&self, x: f64, y: f64) -> (u16, u16) {
        let scale = |v: f64, size: u32| {
            let max = f64::from(size - 1);
            ((v + 0.5).clamp(0.0, max) * f64::from(AbsoluteMouseReport::MAX_COORDINATE) / max)
                .floor() as u16
        };

        (scale(x, self.width), scale(y, self.height))
    }

    fn clamp_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(0.0, f64::from(self.width - 1)),
            y.clamp(0.0, f64::from(self.height - 1)),
        )
    }

    fn sync_keyboard(&mut self, modifiers: Modifiers) -> Result<(), ConnectionError> {
        let keys: Vec<u8> = self
            .pressed_keys
            .iter()
            .take(KeyReport::MAX_KEYS)
            .copied()
            .collect();
        log_soft_failure(self.connection.send_keyboard(modifiers, &keys)?);
        pause(self.pacing.dwell);
        Ok(())
    }

    /// Sends the tracked position and buttons as an absolute report.
    fn commit_mouse(&mut self) -> Result<(), ConnectionError> {
        let (x, y) = self.to_absolute(self.x, self.y);
        log_soft_failure(self.connection.send_mouse_abs(x, y, self.buttons, 0)?);
        Ok(())
    }

    // Keyboard

    /// Presses and holds a key, a modifier (`shift`, `ctrl`, ...) or a named
    /// key (`enter`, `f5`, ...).
    pub fn key_down(&mut self, key: &str) -> Result<(), ConnectionError> {
        if let Some(modifier) = keymap::modifier(key) {
            self.held_modifiers |= modifier;
            return self.sync_keyboard(self.held_modifiers);
        }

        let Some((modifiers, code)) = keymap::key_to_hid(key) else {
            warn!("Ignoring unknown key {:?}", key);
            return Ok(());
        };

        if !self.pressed_keys.contains(&code) {
            self.pressed_keys.push(code);
        }

        // Implied modifiers (shift for 'A') only apply to this report.
        self.sync_keyboard(self.held_modifiers | modifiers)
    }

    pub fn key_up(&mut self, key: &str) -> Result<(), ConnectionError> {
        if let Some(modifier) = keymap::modifier(key) {
            self.held_modifiers.remove(modifier);
        } else if let Some((_, code)) = keymap::key_to_hid(key) {
            self.pressed_keys.retain(|&pressed| pressed != code);
        }

        self.sync_keyboard(self.held_modifiers)
    }

    pub fn release_all_keys(&mut self) -> Result<(), ConnectionError> {
        self.held_modifiers = Modifiers::empty();
        self.pressed_keys.clear();
        self.sync_keyboard(Modifiers::empty())
    }

    pub fn press(&mut self, key: &str) -> Result<(), ConnectionError> {
        self.key_down(key)?;
        pause(self.pacing.key_hold);
        self.key_up(key)
    }

    /// Types `text` one character at a time.
    pub fn write(&mut self, text: &str) -> Result<(), ConnectionError> {
        let start = Instant::now();
        let mut buf = [0; 4];

        for c in text.chars() {
            self.press(c.encode_utf8(&mut buf))?;
        }

        debug!("Typed {} characters in {:?}", text.chars().count(), start.elapsed());
        Ok(())
    }

    /// Presses a key combination such as `["cmd", "space"]` and releases it,
    /// restoring whatever was held before.
    pub fn hotkey(&mut self, keys: &[&str]) -> Result<(), ConnectionError> {
        let mut modifiers = Modifiers::empty();
        let mut codes = Vec::new();

        for key in keys {
            if let Some(modifier) = keymap::modifier(key) {
                modifiers |= modifier;
            } else if let Some((implied, code)) = keymap::key_to_hid(key) {
                modifiers |= implied;
                if !codes.contains(&code) {
                    codes.push(code);
                }
            } else {
                warn!("Ignoring unknown key {:?} in hotkey", key);
            }
        }

        if codes.is_empty() && modifiers.is_empty() {
            return Ok(());
        }

        // Some hosts drop the key if it arrives together with its modifiers.
        if !modifiers.is_empty() {
            log_soft_failure(self.connection.send_keyboard(modifiers, &[])?);
            pause(self.pacing.dwell);
        }

        codes.truncate(KeyReport::MAX_KEYS);
        log_soft_failure(self.connection.send_keyboard(modifiers, &codes)?);
        pause(self.pacing.key_hold);

        self.sync_keyboard(self.held_modifiers)
    }

    /// Presses a numpad key, e.g. `numpad_press("7")` for `num7`.
    pub fn numpad_press(&mut self, key: &str) -> Result<(), ConnectionError> {
        let name = format!("num{key}");
        if keymap::numpad_key(&name).is_none() {
            warn!("Ignoring unknown numpad key {:?}", key);
            return Ok(());
        }

        self.press(&name)
    }

    pub fn numpad_write(&mut self, text: &str) -> Result<(), ConnectionError> {
        let mut buf = [0; 4];
        for c in text.chars() {
            self.numpad_press(c.encode_utf8(&mut buf))?;
        }
        Ok(())
    }

    // Mouse buttons. Button state goes out in absolute reports, which every
    // host honors.

    pub fn mouse_down(&mut self, button: Button) -> Result<(), ConnectionError> {
        self.buttons |= button.mask();
        self.commit_mouse()?;
        pause(self.pacing.dwell);
        Ok(())
    }

    pub fn mouse_up(&mut self, button: Button) -> Result<(), ConnectionError> {
        self.buttons.remove(button.mask());
        self.commit_mouse()?;
        pause(self.pacing.dwell);
        Ok(())
    }

    pub fn click(&mut self, button: Button, clicks: u32) -> Result<(), ConnectionError> {
        for i in 0..clicks {
            self.mouse_down(button)?;
            pause(self.pacing.key_hold);
            self.mouse_up(button)?;

            if i + 1 < clicks {
                pause(self.pacing.double_click_interval);
            }
        }
        Ok(())
    }

    pub fn click_at(
        &mut self,
        x: f64,
        y: f64,
        button: Button,
        clicks: u32,
    ) -> Result<(), ConnectionError> {
        self.move_to(x, y, Duration::ZERO)?;
        self.click(button, clicks)
    }

    pub fn release_mouse_buttons(&mut self) -> Result<(), ConnectionError> {
        self.buttons = MouseButtons::empty();
        self.commit_mouse()?;
        pause(self.pacing.dwell);
        Ok(())
    }

    // Movement

    /// Moves the cursor to `(x, y)`, easing out over `duration`. A zero
    /// duration jumps straight there.
    pub fn move_to(&mut self, x: f64, y: f64, duration: Duration) -> Result<(), ConnectionError> {
        let (start_x, start_y) = (self.x, self.y);
        let (target_x, target_y) = self.clamp_to_screen(x, y);

        if !duration.is_zero() {
            let (dist_x, dist_y) = (target_x - start_x, target_y - start_y);
            if dist_x.abs() < 0.1 && dist_y.abs() < 0.1 {
                return Ok(());
            }

            let interval = self.pacing.move_interval;
            let steps = if interval.is_zero() {
                1
            } else {
                (duration.as_nanos() / interval.as_nanos()).clamp(1, u32::MAX as u128) as u32
            };

            for i in 1..steps {
                let t = f64::from(i) / f64::from(steps);
                let eased = 1.0 - (1.0 - t).powi(2);

                self.x = start_x + dist_x * eased;
                self.y = start_y + dist_y * eased;

                let sent = Instant::now();
                self.commit_mouse()?;
                pause(interval.saturating_sub(sent.elapsed()));
            }
        }

        self.x = target_x;
        self.y = target_y;
        self.commit_mouse()?;
        pause(self.pacing.dwell);
        Ok(())
    }

    /// Moves relative to the tracked position. Goes through absolute reports
    /// since hosts apply acceleration to relative motion.
    pub fn move_rel(&mut self, dx: f64, dy: f64, duration: Duration) -> Result<(), ConnectionError> {
        self.move_to(self.x + dx, self.y + dy, duration)
    }

    // Scrolling

    /// Scrolls vertically. Positive is up.
    pub fn scroll(&mut self, clicks: i32) -> Result<(), ConnectionError> {
        if clicks == 0 {
            return Ok(());
        }

        let steps = clicks
            .unsigned_abs()
            .saturating_mul(self.pacing.scroll_multiplier)
            .min(MAX_SCROLL_STEPS);
        let direction = clicks.signum() as i8;

        for _ in 0..steps {
            log_soft_failure(self.connection.send_mouse_rel(0, 0, self.buttons, direction)?);
            pause(self.pacing.dwell);
        }
        Ok(())
    }

    /// Scrolls horizontally by holding shift while scrolling. Positive is right.
    ///
    /// On a hard failure shift stays tracked as held; call
    /// [`release_all_keys`](Self::release_all_keys) once the connection is usable.
    pub fn hscroll(&mut self, clicks: i32) -> Result<(), ConnectionError> {
        if clicks == 0 {
            return Ok(());
        }

        self.key_down("shift")?;
        self.scroll(clicks)?;
        self.key_up("shift")
    }

    // Dragging

    pub fn drag_to(&mut self, x: f64, y: f64) -> Result<(), ConnectionError> {
        self.drag_rel(x - self.x, y - self.y)
    }

    /// Drags with the left button held, in small relative steps.
    pub fn drag_rel(&mut self, dx: f64, dy: f64) -> Result<(), ConnectionError> {
        let distance = dx.hypot(dy);
        if distance == 0.0 {
            return Ok(());
        }

        let steps = (distance / DRAG_STEP).ceil().max(1.0) as u32;
        let (step_x, step_y) = (dx / f64::from(steps), dy / f64::from(steps));

        self.mouse_down(Button::Left)?;

        // Whole pixels go out, the fractional remainder carries over.
        let (mut acc_x, mut acc_y) = (0.0, 0.0);
        for _ in 0..steps {
            acc_x += step_x;
            acc_y += step_y;

            let (send_x, send_y) = (acc_x.trunc(), acc_y.trunc());
            acc_x -= send_x;
            acc_y -= send_y;

            if send_x != 0.0 || send_y != 0.0 {
                log_soft_failure(self.connection.send_mouse_rel(
                    send_x as i8,
                    send_y as i8,
                    self.buttons,
                    0,
                )?);
            }
        }

        self.mouse_up(Button::Left)?;

        self.x += dx;
        self.y += dy;
        Ok(())
    }

    /// Pins the cursor into the top-left corner with large relative moves and
    /// releases every key and button.
    pub fn reset(&mut self) -> Result<(), ConnectionError> {
        let iterations = self.width.max(self.height) / 100 + 10;

        for _ in 0..iterations {
            log_soft_failure(self.connection.send_mouse_rel(
                -127,
                -127,
                MouseButtons::empty(),
                0,
            )?);
            pause(self.pacing.dwell);
        }

        self.x = 0.0;
        self.y = 0.0;

        self.release_all_keys()?;
        self.release_mouse_buttons()
    }
}
