//! Node identity and Sparkplug topic derivation

use std::fmt;

pub const NAMESPACE: &str = "spBv1.0";

/// Node-level Sparkplug message types used by this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    NBirth,
    NDeath,
    NData,
    NCmd,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::NBirth => "NBIRTH",
            MessageType::NDeath => "NDEATH",
            MessageType::NData => "NDATA",
            MessageType::NCmd => "NCMD",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group and edge node id, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub group_id: String,
    pub node_id: String,
}

impl Identifier {
    pub fn new(group_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            node_id: node_id.into(),
        }
    }

    /// `spBv1.0/{group_id}/{type}/{node_id}`
    pub fn topic(&self, message_type: MessageType) -> String {
        format!("{}/{}/{}/{}", NAMESPACE, self.group_id, message_type, self.node_id)
    }

    pub fn birth_topic(&self) -> String {
        self.topic(MessageType::NBirth)
    }

    pub fn death_topic(&self) -> String {
        self.topic(MessageType::NDeath)
    }

    pub fn data_topic(&self) -> String {
        self.topic(MessageType::NData)
    }

    pub fn command_topic(&self) -> String {
        self.topic(MessageType::NCmd)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let ident = Identifier::new("Sparkplug_Devices", "raspi-01");
        assert_eq!(ident.birth_topic(), "spBv1.0/Sparkplug_Devices/NBIRTH/raspi-01");
        assert_eq!(ident.death_topic(), "spBv1.0/Sparkplug_Devices/NDEATH/raspi-01");
        assert_eq!(ident.data_topic(), "spBv1.0/Sparkplug_Devices/NDATA/raspi-01");
        assert_eq!(ident.command_topic(), "spBv1.0/Sparkplug_Devices/NCMD/raspi-01");
    }

    #[test]
    fn test_segments_are_case_sensitive() {
        let ident = Identifier::new("Plant", "Node");
        assert_ne!(ident.birth_topic(), Identifier::new("plant", "node").birth_topic());
        assert_eq!(ident.to_string(), "Plant/Node");
    }
}
