use std::{env, time::Duration};

use ch9329_serial::{
    automation::{Button, HidController},
    connection::ConnectionError,
    serial::{self, DEFAULT_BAUD_RATE},
    ConnectionOptions,
};

fn main() -> Result<(), ConnectionError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let mut args = env::args().skip(1);
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let text = args.next().unwrap_or_else(|| "Hello, world!".to_string());

    let connection = serial::connect(&port, DEFAULT_BAUD_RATE, ConnectionOptions::default())?;
    let mut hid = HidController::new(connection, 1920, 1080);

    hid.reset()?;
    hid.move_to(960.0, 540.0, Duration::from_millis(400))?;
    hid.click(Button::Left, 1)?;
    hid.write(&text)?;
    hid.hotkey(&["ctrl", "a"])?;

    Ok(())
}
