use std::env;

use ch9329_serial::{
    connection::ConnectionError,
    packets::descriptor::UsbStringKind,
    serial::{self, DEFAULT_BAUD_RATE},
    ConnectionOptions,
};
use log::{error, info};

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
    let product = args.next();

    let mut connection = serial::connect(&port, DEFAULT_BAUD_RATE, ConnectionOptions::default())?;

    // Optionally rename the product and turn custom descriptors on.
    if let Some(product) = product {
        if let Err(failure) = connection.set_usb_descriptor(UsbStringKind::Product, &product)? {
            error!("{}", failure);
        }

        if let Ok(mut config) = connection.get_config()? {
            config.set_custom_descriptors(false, true, false);
            if let Err(failure) = connection.set_config(&config)? {
                error!("{}", failure);
            }
            info!("Reset the chip or replug it for the new descriptor to show up");
        }
    }

    for kind in [
        UsbStringKind::Vendor,
        UsbStringKind::Product,
        UsbStringKind::SerialNumber,
    ] {
        match connection.get_usb_descriptor(kind)? {
            Ok(value) => info!("{:?}: {:?}", kind, value),
            Err(failure) => error!("{:?}: {}", kind, failure),
        }
    }

    Ok(())
}
