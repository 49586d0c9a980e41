//! Station-mode connection using the saved profiles.

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    nvs::EspDefaultNvs,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

use crate::profile::{ProfileStore, WifiProfile};

type SharedStore = Arc<Mutex<(ProfileStore, EspDefaultNvs)>>;

/// Tries the saved profiles in `candidates()` order (active first, then
/// by descending priority). The first profile that associates and gets
/// the netif up becomes the active one.
pub fn connect(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    store: &SharedStore,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let (order, profiles) = {
        let guard = store.lock().unwrap();
        (guard.0.candidates(), guard.0.profiles().to_vec())
    };
    anyhow::ensure!(!order.is_empty(), "no saved profiles");

    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), None)?, sysloop)?;

    for index in order {
        let profile = &profiles[index];
        log::info!(
            "Trying profile {} ({}, priority {})",
            index,
            profile.ssid,
            profile.priority
        );

        if let Err(e) = try_profile(&mut wifi, profile) {
            log::warn!("Profile {} failed: {:?}", profile.ssid, e);
            let _ = wifi.stop();
            continue;
        }

        let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
        log::info!("Connected to {} with IP {}", profile.ssid, ip_info.ip);

        let mut guard = store.lock().unwrap();
        let (store, nvs) = &mut *guard;
        if store.active() != Some(index) {
            store.set_active(index)?;
            store.persist(nvs)?;
        }
        return Ok(wifi);
    }

    anyhow::bail!("all saved profiles failed to connect")
}

fn try_profile(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    profile: &WifiProfile,
) -> anyhow::Result<()> {
    let sta_netif = if profile.uses_dhcp() {
        EspNetif::new(NetifStack::Sta)?
    } else {
        EspNetif::new_with_conf(&static_netif_conf(profile)?)?
    };
    wifi.wifi_mut().swap_netif_sta(sta_netif)?;

    let auth_method = if profile.password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    let config = Configuration::Client(ClientConfiguration {
        ssid: profile
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long: {}", profile.ssid))?,
        password: profile
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        auth_method,
        ..Default::default()
    });

    wifi.set_configuration(&config)?;
    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;
    Ok(())
}

fn static_netif_conf(profile: &WifiProfile) -> anyhow::Result<NetifConfiguration> {
    let prefix = mask_prefix(profile.subnet)?;
    let gateway = ipv4::Ipv4Addr::from(profile.gateway);
    Ok(NetifConfiguration {
        ip_configuration: Some(ipv4::Configuration::Client(
            ipv4::ClientConfiguration::Fixed(ipv4::ClientSettings {
                ip: ipv4::Ipv4Addr::from(profile.ip),
                subnet: Subnet {
                    gateway,
                    mask: Mask(prefix),
                },
                // No resolver configured on the form; the gateway it is.
                dns: Some(gateway),
                secondary_dns: None,
            }),
        )),
        ..NetifConfiguration::wifi_default_client()
    })
}

/// Converts a dotted netmask to a prefix length, rejecting masks with
/// holes (e.g. 255.0.255.0).
pub fn mask_prefix(mask: [u8; 4]) -> anyhow::Result<u8> {
    let bits = u32::from_be_bytes(mask);
    let prefix = bits.leading_ones();
    let tail = bits.checked_shl(prefix).unwrap_or(0);
    anyhow::ensure!(
        tail == 0,
        "non-contiguous subnet mask: {}.{}.{}.{}",
        mask[0],
        mask[1],
        mask[2],
        mask[3]
    );
    Ok(prefix as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_masks_convert_to_prefix() {
        assert_eq!(mask_prefix([255, 255, 255, 0]).unwrap(), 24);
        assert_eq!(mask_prefix([255, 255, 0, 0]).unwrap(), 16);
        assert_eq!(mask_prefix([255, 255, 255, 252]).unwrap(), 30);
        assert_eq!(mask_prefix([255, 255, 255, 255]).unwrap(), 32);
        assert_eq!(mask_prefix([0, 0, 0, 0]).unwrap(), 0);
    }

    #[test]
    fn masks_with_holes_are_rejected() {
        assert!(mask_prefix([255, 0, 255, 0]).is_err());
        assert!(mask_prefix([255, 255, 255, 1]).is_err());
        assert!(mask_prefix([0, 255, 255, 255]).is_err());
    }
}
