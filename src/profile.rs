//! Saved WiFi profiles and their NVS-backed store.

use esp_idf_svc::nvs::EspDefaultNvs;
use serde::{Deserialize, Serialize};

/// Flat capacity limit, matching the on-device form.
pub const MAX_PROFILES: usize = 10;

/// Field caps, same as the WiFi driver's own credential limits. They
/// also bound the serialized store so a full store always reloads.
pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;

/// NVS blob key holding the serialized store.
const NVS_KEY: &str = "profiles";

/// A profile whose address equals the AP default is treated as DHCP
/// (the web form pre-fills 192.168.4.1 and tells the user to leave it
/// alone unless they want a static address).
pub const DHCP_ADDR: [u8; 4] = [192, 168, 4, 1];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiProfile {
    pub ssid: String,
    pub password: String,
    /// Higher value wins when picking a network to join.
    pub priority: u8,
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub subnet: [u8; 4],
    /// TCP port the command server listens on once connected.
    pub port: u16,
}

impl WifiProfile {
    pub fn uses_dhcp(&self) -> bool {
        self.ip == DHCP_ADDR
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileStore {
    profiles: Vec<WifiProfile>,
    active: Option<usize>,
}

impl ProfileStore {
    /// Loads the store from NVS. Any read or decode failure yields an
    /// empty store; the portal will repopulate it.
    pub fn load(nvs: &EspDefaultNvs) -> Self {
        let len = match nvs.blob_len(NVS_KEY) {
            Ok(Some(len)) => len,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::error!("Failed to read profile store size: {:?}", e);
                return Self::default();
            }
        };

        let mut buf = vec![0u8; len];
        match nvs.get_blob(NVS_KEY, &mut buf) {
            Ok(Some(raw)) => serde_json::from_slice(raw).unwrap_or_else(|e| {
                log::error!("Corrupt profile store in NVS, starting empty: {:?}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                log::error!("Failed to read profile store: {:?}", e);
                Self::default()
            }
        }
    }

    /// Writes the store back to NVS. Called synchronously after every
    /// mutation; last write wins.
    pub fn persist(&self, nvs: &mut EspDefaultNvs) -> anyhow::Result<()> {
        let raw = serde_json::to_vec(self)?;
        nvs.set_blob(NVS_KEY, &raw)?;
        Ok(())
    }

    pub fn profiles(&self) -> &[WifiProfile] {
        &self.profiles
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn active_profile(&self) -> Option<&WifiProfile> {
        self.active.and_then(|i| self.profiles.get(i))
    }

    pub fn add(&mut self, profile: WifiProfile) -> anyhow::Result<()> {
        if self.profiles.len() >= MAX_PROFILES {
            anyhow::bail!("Maximum profiles reached");
        }
        if profile.ssid.len() > MAX_SSID_LEN {
            anyhow::bail!("SSID too long (max {} bytes)", MAX_SSID_LEN);
        }
        if profile.password.len() > MAX_PASSWORD_LEN {
            anyhow::bail!("Password too long (max {} bytes)", MAX_PASSWORD_LEN);
        }
        self.profiles.push(profile);
        if self.active.is_none() {
            self.active = Some(self.profiles.len() - 1);
        }
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> anyhow::Result<()> {
        if index >= self.profiles.len() {
            anyhow::bail!("Invalid index");
        }
        self.profiles.remove(index);
        self.active = match self.active {
            Some(a) if a == index => None,
            Some(a) if a > index => Some(a - 1),
            other => other,
        };
        Ok(())
    }

    pub fn set_active(&mut self, index: usize) -> anyhow::Result<()> {
        if index >= self.profiles.len() {
            anyhow::bail!("Invalid index");
        }
        self.active = Some(index);
        Ok(())
    }

    pub fn set_priority(&mut self, index: usize, priority: u8) -> anyhow::Result<()> {
        if index >= self.profiles.len() {
            anyhow::bail!("Invalid index");
        }
        self.profiles[index].priority = priority;
        Ok(())
    }

    /// Connection order: the active profile first, then the rest by
    /// descending priority. Equal priorities keep insertion order.
    pub fn candidates(&self) -> Vec<usize> {
        let mut rest: Vec<usize> = (0..self.profiles.len())
            .filter(|&i| self.active != Some(i))
            .collect();
        rest.sort_by_key(|&i| std::cmp::Reverse(self.profiles[i].priority));

        let mut order = Vec::with_capacity(self.profiles.len());
        if let Some(a) = self.active {
            if a < self.profiles.len() {
                order.push(a);
            }
        }
        order.extend(rest);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(ssid: &str, priority: u8) -> WifiProfile {
        WifiProfile {
            ssid: ssid.to_string(),
            password: "secret".to_string(),
            priority,
            ip: DHCP_ADDR,
            gateway: [192, 168, 4, 1],
            subnet: [255, 255, 255, 0],
            port: 8888,
        }
    }

    #[test]
    fn first_added_profile_becomes_active() {
        let mut store = ProfileStore::default();
        store.add(profile("home", 100)).unwrap();
        store.add(profile("office", 200)).unwrap();
        assert_eq!(store.active(), Some(0));
        assert_eq!(store.active_profile().unwrap().ssid, "home");
    }

    #[test]
    fn add_rejects_when_full() {
        let mut store = ProfileStore::default();
        for i in 0..MAX_PROFILES {
            store.add(profile(&format!("net{}", i), 0)).unwrap();
        }
        assert!(store.add(profile("overflow", 0)).is_err());
        assert_eq!(store.profiles().len(), MAX_PROFILES);
    }

    #[test]
    fn add_rejects_oversized_credentials() {
        let mut store = ProfileStore::default();

        let mut long_ssid = profile("x", 0);
        long_ssid.ssid = "s".repeat(MAX_SSID_LEN + 1);
        assert!(store.add(long_ssid).is_err());

        let mut long_pass = profile("x", 0);
        long_pass.password = "p".repeat(MAX_PASSWORD_LEN + 1);
        assert!(store.add(long_pass).is_err());

        assert!(store.is_empty());

        let mut at_limit = profile("x", 0);
        at_limit.ssid = "s".repeat(MAX_SSID_LEN);
        at_limit.password = "p".repeat(MAX_PASSWORD_LEN);
        assert!(store.add(at_limit).is_ok());
    }

    #[test]
    fn full_store_of_max_size_profiles_stays_reloadable() {
        let mut store = ProfileStore::default();
        for i in 0..MAX_PROFILES {
            let mut p = profile("x", i as u8);
            p.ssid = format!("net{:02}{}", i, "s".repeat(MAX_SSID_LEN - 5));
            p.password = "p".repeat(MAX_PASSWORD_LEN);
            store.add(p).unwrap();
        }

        let raw = serde_json::to_vec(&store).unwrap();
        let decoded: ProfileStore = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded.profiles(), store.profiles());
    }

    #[test]
    fn delete_shifts_active_index() {
        let mut store = ProfileStore::default();
        store.add(profile("a", 0)).unwrap();
        store.add(profile("b", 0)).unwrap();
        store.add(profile("c", 0)).unwrap();
        store.set_active(2).unwrap();

        store.delete(0).unwrap();
        assert_eq!(store.active(), Some(1));
        assert_eq!(store.active_profile().unwrap().ssid, "c");
    }

    #[test]
    fn delete_active_clears_selection() {
        let mut store = ProfileStore::default();
        store.add(profile("a", 0)).unwrap();
        store.add(profile("b", 0)).unwrap();
        store.set_active(1).unwrap();

        store.delete(1).unwrap();
        assert_eq!(store.active(), None);
    }

    #[test]
    fn delete_out_of_range_fails() {
        let mut store = ProfileStore::default();
        store.add(profile("a", 0)).unwrap();
        assert!(store.delete(3).is_err());
        assert!(store.set_active(1).is_err());
        assert!(store.set_priority(1, 10).is_err());
    }

    #[test]
    fn candidates_put_active_first_then_priority() {
        let mut store = ProfileStore::default();
        store.add(profile("low", 10)).unwrap();
        store.add(profile("high", 200)).unwrap();
        store.add(profile("mid", 100)).unwrap();
        store.set_active(0).unwrap();

        assert_eq!(store.candidates(), vec![0, 1, 2]);

        store.set_active(2).unwrap();
        assert_eq!(store.candidates(), vec![2, 1, 0]);
    }

    #[test]
    fn candidates_stable_for_equal_priority() {
        let mut store = ProfileStore::default();
        store.add(profile("a", 50)).unwrap();
        store.add(profile("b", 50)).unwrap();
        store.add(profile("c", 50)).unwrap();
        store.set_active(1).unwrap();

        assert_eq!(store.candidates(), vec![1, 0, 2]);
    }

    #[test]
    fn store_round_trips_through_json() {
        let mut store = ProfileStore::default();
        store.add(profile("home", 100)).unwrap();
        let raw = serde_json::to_vec(&store).unwrap();
        let decoded: ProfileStore = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded.profiles(), store.profiles());
        assert_eq!(decoded.active(), Some(0));
    }
}
