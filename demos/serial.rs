use std::env;
use std::time::Duration;

use gwinstek_gpd_psu::session::{Session, SessionConfig};
use gwinstek_gpd_psu::types::{Channel, State};
use inquire::Text;
use log::info;

// Configuration constants - adjust these for your setup
const OUTPUT_VOLTAGE_V: f64 = 5.0;
const CURRENT_LIMIT_A: f64 = 0.1;
// Larger steps than the default keep the demo short.
const VOLTAGE_STEP_V: f64 = 0.5;
const STABILIZATION_DELAY_MS: u64 = 1000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Get serial port from command line arg or ask for it
    let port_name = match env::args().nth(1) {
        Some(port) => port,
        None => Text::new("Serial port of the PSU:")
            .with_placeholder("/dev/ttyUSB0")
            .prompt()?,
    };

    println!("Using port: {port_name}");

    let config = SessionConfig::default().with_voltage_step(VOLTAGE_STEP_V);
    let mut session = Session::open_serial_with(&port_name, config)?;
    let psu = session.psu()?;

    let identity = psu.identify()?;
    println!("Identification: {}", identity.as_str());
    println!("Model family: {:?}", psu.get_model_family()?);

    psu.set_current(Channel::CH1, CURRENT_LIMIT_A)?;
    println!("Set current limit to {CURRENT_LIMIT_A}A");

    psu.on()?;
    println!("Output enabled");

    // With the output on this walks up from the present setpoint.
    psu.ramp_voltage(Channel::CH1, OUTPUT_VOLTAGE_V)?;
    println!("Ramped CH1 to {OUTPUT_VOLTAGE_V}V");

    // Wait for output to stabilize
    std::thread::sleep(Duration::from_millis(STABILIZATION_DELAY_MS));

    let measured_voltage = psu.read_output_voltage(Channel::CH1)?;
    let measured_current = psu.read_output_current(Channel::CH1)?;
    println!("Measured output: {measured_voltage:.3}V {measured_current:.3}A");

    let status = psu.get_status()?;
    println!("Status: {status:#?}");
    info!("Last PSU error: {}", psu.get_error()?);

    session.shutdown_all_channels()?;
    let state = session.psu()?.get_output_state()?;
    if state != State::Off {
        return Err(format!("output still {state:?} after shutdown").into());
    }
    println!("All channels ramped down and output disabled");

    session.close()?;
    Ok(())
}
