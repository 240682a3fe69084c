use crate::Addr;
use serde::{Deserialize, Serialize};

/// Who may later migrate a contract, chosen at instantiation time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminOption {
    SetToAddr(Addr),
    SetToSelf,
    #[default]
    SetToNone,
}

impl AdminOption {
    /// Resolve against the address the contract is about to receive
    pub fn decide(self, self_addr: &Addr) -> Option<Addr> {
        match self {
            AdminOption::SetToAddr(addr) => Some(addr),
            AdminOption::SetToSelf => Some(*self_addr),
            AdminOption::SetToNone => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide() {
        let contract = Addr::from_array([7; 32]);
        let other = Addr::from_array([9; 32]);
        assert_eq!(AdminOption::SetToSelf.decide(&contract), Some(contract));
        assert_eq!(AdminOption::SetToAddr(other).decide(&contract), Some(other));
        assert_eq!(AdminOption::SetToNone.decide(&contract), None);
    }
}
