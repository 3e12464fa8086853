//! Classification of operations into balance transfers and everything else

use crate::ledger::Operation;

pub const TRANSFER_SECTION: &str = "balances";

/// Methods that move balance from the signer to the first argument.
pub const TRANSFER_METHODS: [&str; 3] = ["transfer", "transferKeepAlive", "transferAllowDeath"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    Transfer { sender: &'a str, receiver: &'a str },
    Other,
}

impl<'a> Classification<'a> {
    /// Receiver of a transfer; empty for any other shape.
    pub fn receiver(&self) -> &'a str {
        match *self {
            Classification::Transfer { receiver, .. } => receiver,
            Classification::Other => "",
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Classification::Transfer { .. })
    }
}

pub fn is_transfer_method(section: &str, method: &str) -> bool {
    section == TRANSFER_SECTION && TRANSFER_METHODS.contains(&method)
}

/// Classify one operation. Never fails: anything not recognized as a signed
/// transfer with a destination is [`Classification::Other`].
pub fn classify(op: &Operation) -> Classification<'_> {
    if !is_transfer_method(&op.section, &op.method) {
        return Classification::Other;
    }
    match (op.is_signed, op.signer.as_deref(), op.args.first()) {
        (true, Some(sender), Some(receiver)) => Classification::Transfer {
            sender,
            receiver: receiver.as_str(),
        },
        _ => Classification::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(method: &str) -> Operation {
        Operation::signed("0x01", "Alice", "balances", method, vec!["Bob".into(), "5".into()])
    }

    #[test]
    fn test_transfer_family() {
        for method in TRANSFER_METHODS {
            let op = transfer(method);
            assert_eq!(
                classify(&op),
                Classification::Transfer {
                    sender: "Alice",
                    receiver: "Bob"
                }
            );
        }
    }

    #[test]
    fn test_other_balances_methods() {
        let op = transfer("forceTransfer");
        assert_eq!(classify(&op), Classification::Other);
        assert_eq!(classify(&op).receiver(), "");
    }

    #[test]
    fn test_wrong_section() {
        let op = Operation::signed("0x01", "Alice", "assets", "transfer", vec!["Bob".into()]);
        assert!(!classify(&op).is_transfer());
    }

    #[test]
    fn test_unsigned_transfer_is_other() {
        let op = Operation::unsigned("0x01", "balances", "transfer", vec!["Bob".into()]);
        assert_eq!(classify(&op), Classification::Other);
    }

    #[test]
    fn test_missing_destination_is_other() {
        let op = Operation::signed("0x01", "Alice", "balances", "transfer", vec![]);
        assert_eq!(classify(&op), Classification::Other);
    }

    #[test]
    fn test_opaque_operation_is_other() {
        assert_eq!(classify(&Operation::opaque("0xff")), Classification::Other);
    }
}
