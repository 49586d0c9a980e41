use std::sync::{Arc, Mutex};
use std::time::Duration;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvs;

mod command;
mod network;
mod portal;
mod profile;

use profile::ProfileStore;

/// NVS flag forcing the portal on next boot (set after connect failure).
const PROVISION_FLAG: &str = "provision";

/// How long the configuration AP stays up before the device gives up
/// and reboots.
const PORTAL_TIMEOUT: Duration = Duration::from_secs(300);

type SharedStore = Arc<Mutex<(ProfileStore, EspDefaultNvs)>>;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = esp_idf_svc::hal::prelude::Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    let nvs = esp_idf_svc::nvs::EspDefaultNvs::new(partition, "wifimgr", true)?;

    let store = ProfileStore::load(&nvs);
    let provision = nvs.get_u8(PROVISION_FLAG).ok().flatten().unwrap_or(0) != 0;

    log::info!(
        "Loaded {} profile(s), active: {:?}",
        store.profiles().len(),
        store.active()
    );

    // Holding the boot button low forces the portal
    let mut button = PinDriver::input(peripherals.pins.gpio0)?;
    button.set_pull(Pull::Up)?;

    let mac_suffix = mac_suffix();
    let enter_portal = store.is_empty() || provision || button.is_low();

    let store: SharedStore = Arc::new(Mutex::new((store, nvs)));

    if enter_portal {
        store.lock().unwrap().1.set_u8(PROVISION_FLAG, 0)?;
        run_portal(peripherals.modem, sysloop, &mac_suffix, store.clone())?;
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    match network::connect(peripherals.modem, sysloop, &store) {
        Ok(_wifi) => {
            let port = {
                let guard = store.lock().unwrap();
                guard.0.active_profile().map(|p| p.port).unwrap_or(8888)
            };
            // Runs forever; an error here means the listener itself died
            let result = command::serve(port);
            log::error!("Command server exited: {:?}", result);
        }
        Err(e) => {
            log::error!("Station connect failed: {:?}", e);
            log::info!("Rebooting into the config portal");
            store.lock().unwrap().1.set_u8(PROVISION_FLAG, 1)?;
        }
    }

    unsafe { esp_idf_svc::sys::esp_restart() }
}

/// Brings the portal up and waits until the user activates a profile or
/// the configuration window times out. Either way the caller reboots.
fn run_portal(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    mac_suffix: &str,
    store: SharedStore,
) -> anyhow::Result<()> {
    let (evt_tx, mut evt_rx) = tokio::sync::mpsc::channel(4);

    let portal = portal::ConfigPortal::start(modem, sysloop, mac_suffix, store, evt_tx)?;
    log::info!(
        "Connect to 'WifiMgr-{}' (password: {}) and open http://{}",
        mac_suffix,
        portal::ConfigPortal::ap_password(),
        portal::ConfigPortal::get_ap_ip()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        tokio::select! {
            evt = evt_rx.recv() => {
                log::info!("Portal event: {:?}, leaving AP mode", evt);
                // Give the handler's response time to reach the browser
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            _ = tokio::time::sleep(PORTAL_TIMEOUT) => {
                log::info!("Configuration timeout, leaving AP mode");
            }
        }
    });

    drop(portal);
    Ok(())
}

/// Last three bytes of the station MAC, used in the AP SSID.
fn mac_suffix() -> String {
    let mut mac = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        );
    }
    format!("{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5])
}
