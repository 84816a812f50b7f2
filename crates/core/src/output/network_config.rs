use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// A local network interface sACN is sent from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInterface {
    pub name: String,
    pub address: Ipv4Addr,
}

impl OutputInterface {
    pub fn new(name: &str, address: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            address,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub interfaces: Vec<OutputInterface>,
    pub universe_routing: HashMap<u16, usize>, // universe -> interface index
    /// Interface for universes without a route.
    pub default_interface: Option<usize>,
}

impl NetworkConfig {
    /// A single interface carrying every universe, or no output at all.
    pub fn new(interface: Option<Ipv4Addr>) -> Self {
        match interface {
            Some(address) => NetworkConfig {
                interfaces: vec![OutputInterface::new("default", address)],
                universe_routing: HashMap::new(),
                default_interface: Some(0),
            },
            None => NetworkConfig::default(),
        }
    }

    pub fn new_multi_interface(
        interfaces: Vec<OutputInterface>,
        universe_routing: HashMap<u16, usize>,
        default_interface: Option<usize>,
    ) -> Self {
        NetworkConfig {
            interfaces,
            universe_routing,
            default_interface,
        }
    }

    // Add an interface and return its index
    pub fn add_interface(&mut self, interface: OutputInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    // Route a universe to a specific interface
    pub fn route_universe(&mut self, universe: u16, interface_index: usize) {
        if interface_index < self.interfaces.len() {
            self.universe_routing.insert(universe, interface_index);
        }
    }

    pub fn set_default_interface(&mut self, interface_index: Option<usize>) {
        self.default_interface = interface_index.filter(|idx| *idx < self.interfaces.len());
    }

    /// Interface a universe goes out on; `None` means the universe is not sent.
    pub fn interface_for_universe(&self, universe: u16) -> Option<&OutputInterface> {
        self.universe_routing
            .get(&universe)
            .copied()
            .or(self.default_interface)
            .and_then(|idx| self.interfaces.get(idx))
    }

    pub fn describe(&self) -> String {
        if self.interfaces.is_empty() {
            return "No interfaces configured".to_string();
        }

        let mut result = String::new();
        for (i, interface) in self.interfaces.iter().enumerate() {
            if i > 0 {
                result.push_str(", ");
            }
            result.push_str(&format!("{}: {}", interface.name, interface.address));
            if self.default_interface == Some(i) {
                result.push_str(" (default)");
            }
        }
        result
    }
}
