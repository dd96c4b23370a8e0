use hex_literal::hex;

use crate::primitives::{DomainType, Epoch};

pub const DOMAIN_BEACON_ATTESTER: DomainType = hex!("01000000");
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
