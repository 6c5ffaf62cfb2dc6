use junoscan_model::{ConnectionParameters, Inventory, ParameterMap, StaticParameters};
use std::iter::FusedIterator;
use std::slice;

/// Lazily yields one `ConnectionParameters` per inventory host, in inventory
/// order. Consumed once; build a new one to start over.
pub struct ConnectionParams<'a> {
    global: &'a ParameterMap,
    hosts: slice::Iter<'a, ParameterMap>,
    fixed: ParameterMap,
}

pub fn connection_parameters<'a>(
    inventory: &'a Inventory,
    statics: &StaticParameters,
) -> ConnectionParams<'a> {
    ConnectionParams {
        global: &inventory.global_credentials,
        hosts: inventory.hosts.iter(),
        fixed: statics.to_map(),
    }
}

/// Globals first, then the host entry, then the fixed protocol parameters.
/// Later layers replace earlier ones key by key.
pub fn merge(
    global: &ParameterMap,
    host: &ParameterMap,
    fixed: &ParameterMap,
) -> ConnectionParameters {
    let mut merged = ParameterMap::new();
    for layer in [global, host, fixed] {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    ConnectionParameters::new(merged)
}

impl Iterator for ConnectionParams<'_> {
    type Item = ConnectionParameters;

    fn next(&mut self) -> Option<Self::Item> {
        self.hosts
            .next()
            .map(|host| merge(self.global, host, &self.fixed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hosts.size_hint()
    }
}

impl ExactSizeIterator for ConnectionParams<'_> {}

impl FusedIterator for ConnectionParams<'_> {}
