use std::env;

use ch9329_serial::{
    connection::ConnectionError,
    serial::{self, DEFAULT_BAUD_RATE},
    ConnectionOptions,
};
use log::{error, info};

fn main() -> Result<(), ConnectionError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let port = env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let mut connection = serial::connect(&port, DEFAULT_BAUD_RATE, ConnectionOptions::default())?;

    match connection.get_info()? {
        Ok(info) => {
            info!("Firmware: {}", info.version_string());
            info!("USB connected: {}", info.usb_connected);
            info!("LEDs: {:?}", info.leds());
        }
        Err(failure) => error!("{}", failure),
    }

    match connection.get_config()? {
        Ok(config) => info!("{:#?}", config),
        Err(failure) => error!("{}", failure),
    }

    Ok(())
}
