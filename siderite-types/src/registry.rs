//! The described-type registry an engine starts from

use siderite_codec::registry::Registry;

use crate::messaging::{
    Accepted, AmqpSequence, AmqpValue, ApplicationProperties, Data, DeliveryAnnotations, Footer,
    Header, MessageAnnotations, Modified, Properties, Received, Rejected, Released, Source,
    Target,
};
use crate::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Transfer,
};
use crate::sasl::{SaslChallenge, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse};

macro_rules! register_lists {
    ($registry:ident, $( $ty:ty ),* $(,)?) => {
        $( $registry.register(<$ty>::DESCRIPTOR_CODE, <$ty>::DESCRIPTOR_NAME, Registry::expect_list); )*
    };
}

macro_rules! register_maps {
    ($registry:ident, $( $ty:ty ),* $(,)?) => {
        $( $registry.register(<$ty>::DESCRIPTOR_CODE, <$ty>::DESCRIPTOR_NAME, Registry::expect_map); )*
    };
}

/// A registry pre-loaded with every standard transport and messaging
/// descriptor; the hooks validate body shape at decode time, everything else
/// stays opaque until applications register their own types
pub fn transport_registry() -> Registry {
    let mut registry = Registry::new();
    register_lists!(
        registry,
        Open,
        Begin,
        Attach,
        Flow,
        Transfer,
        Disposition,
        Detach,
        End,
        Close,
        SaslMechanisms,
        SaslInit,
        SaslChallenge,
        SaslResponse,
        SaslOutcome,
        Header,
        Properties,
        AmqpSequence,
        Received,
        Accepted,
        Rejected,
        Released,
        Modified,
        Source,
        Target,
    );
    register_maps!(
        registry,
        DeliveryAnnotations,
        MessageAnnotations,
        ApplicationProperties,
        Footer,
    );
    // data and amqp-value bodies may be any shape; register them opaque so a
    // future hook cannot shadow them accidentally
    registry.register(Data::DESCRIPTOR_CODE, Data::DESCRIPTOR_NAME, |d, v| {
        Ok(siderite_codec::value::Value::described(d.clone(), v))
    });
    registry.register(AmqpValue::DESCRIPTOR_CODE, AmqpValue::DESCRIPTOR_NAME, |d, v| {
        Ok(siderite_codec::value::Value::described(d.clone(), v))
    });
    registry
}

#[cfg(test)]
mod tests {
    use siderite_codec::de::Decoder;
    use siderite_codec::read::SliceReader;
    use siderite_codec::ser::to_vec;
    use siderite_codec::value::Value;

    use super::transport_registry;

    #[test]
    fn performative_with_a_non_list_body_is_rejected() {
        let registry = transport_registry();
        let bad = to_vec(&Value::described(0x10u64, Value::UInt(3))).unwrap();
        let mut decoder = Decoder::with_registry(SliceReader::new(&bad), &registry);
        assert!(decoder.read_value().is_err());
    }

    #[test]
    fn vendor_descriptor_stays_opaque() {
        let registry = transport_registry();
        let vendor = to_vec(&Value::described("vendor:thing", Value::UInt(3))).unwrap();
        let mut decoder = Decoder::with_registry(SliceReader::new(&vendor), &registry);
        assert_eq!(
            decoder.read_value().unwrap(),
            Value::described("vendor:thing", Value::UInt(3))
        );
    }
}
