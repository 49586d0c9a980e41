//! SoftAP bring-up and HTTP server lifecycle.

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    http::server::{Configuration, EspHttpServer},
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    nvs::EspDefaultNvs,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration as WifiConfig, EspWifi,
        WifiDriver,
    },
};
use tokio::sync::mpsc::Sender;

use super::{handlers, PortalEvent};
use crate::profile::ProfileStore;

/// Fixed addressing for AP mode.
const AP_IP: ipv4::Ipv4Addr = ipv4::Ipv4Addr::new(192, 168, 4, 1);
const AP_GATEWAY: ipv4::Ipv4Addr = ipv4::Ipv4Addr::new(192, 168, 4, 1);
const AP_NETMASK: Mask = Mask(24);

/// WPA2 password for the config network.
pub const AP_PASSWORD: &str = "12345678";

pub struct ConfigPortal<'a> {
    _wifi: BlockingWifi<EspWifi<'a>>,
    _server: EspHttpServer<'a>,
}

impl<'a> ConfigPortal<'a> {
    pub fn start(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        mac_suffix: &str,
        store: Arc<Mutex<(ProfileStore, EspDefaultNvs)>>,
        events: Sender<PortalEvent>,
    ) -> anyhow::Result<Self> {
        let wifi = Self::start_ap(modem, sysloop, mac_suffix)?;
        log::info!("SoftAP started: WifiMgr-{}", mac_suffix);

        let server = Self::start_http_server(store, events)?;
        log::info!("HTTP server started on {}:80", AP_IP);

        Ok(Self {
            _wifi: wifi,
            _server: server,
        })
    }

    fn start_ap(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        mac_suffix: &str,
    ) -> anyhow::Result<BlockingWifi<EspWifi<'a>>> {
        // AP netif with a fixed address; the device is its own gateway
        // and DNS so captive portal probes resolve here.
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: AP_GATEWAY,
                    mask: AP_NETMASK,
                },
                dhcp_enabled: true,
                dns: Some(AP_IP),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };

        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;

        let driver = WifiDriver::new(modem, sysloop.clone(), None)?;

        // STA netif is unused in AP mode but wrap_all wants one.
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let mut wifi = BlockingWifi::wrap(
            EspWifi::wrap_all(driver, sta_netif, ap_netif)?,
            sysloop,
        )?;

        let ssid = format!("WifiMgr-{}", mac_suffix);
        let ap_config = AccessPointConfiguration {
            ssid: ssid.as_str().try_into().unwrap(),
            ssid_hidden: false,
            channel: 1,
            auth_method: AuthMethod::WPA2Personal,
            password: AP_PASSWORD.try_into().unwrap(),
            max_connections: 4,
            ..Default::default()
        };

        wifi.set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        wifi.start()?;

        Ok(wifi)
    }

    fn start_http_server(
        store: Arc<Mutex<(ProfileStore, EspDefaultNvs)>>,
        events: Sender<PortalEvent>,
    ) -> anyhow::Result<EspHttpServer<'a>> {
        let config = Configuration {
            stack_size: 8192,
            max_uri_handlers: 12,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&config)?;

        handlers::register_routes(&mut server, store, events)?;

        Ok(server)
    }

    pub fn get_ap_ip() -> &'static str {
        "192.168.4.1"
    }

    pub fn ap_password() -> &'static str {
        AP_PASSWORD
    }
}
