pub use ethereum_types::H256;

pub type Slot = u64;
pub type Epoch = u64;
pub type CommitteeIndex = u64;
pub type ValidatorIndex = u64;

pub type DomainType = [u8; 4];
