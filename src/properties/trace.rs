use crate::attrs::{AttrVal, TimelineAttrKey};
use crate::input::TraceInput;
use crate::metadata::{EnvValue, Metadata};
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, Debug)]
pub struct CtfTraceProperties {
    attrs: BTreeMap<TimelineAttrKey, AttrVal>,
}

impl CtfTraceProperties {
    pub fn new(input: &TraceInput, metadata: &Metadata, customization: &str) -> Self {
        let mut attrs = BTreeMap::default();
        let t = &metadata.trace;

        if t.has_uuid() {
            attrs.insert(TimelineAttrKey::TraceUuid, t.uuid.to_string().into());
        }
        attrs.insert(
            TimelineAttrKey::TraceVersion,
            format!("{}.{}", t.major, t.minor).into(),
        );
        attrs.insert(
            TimelineAttrKey::TraceByteOrder,
            t.byte_order.to_string().into(),
        );
        attrs.insert(
            TimelineAttrKey::TraceStreamCount,
            AttrVal::unsigned(input.streams().len() as u64),
        );
        attrs.insert(TimelineAttrKey::TraceName, input.name.as_str().into());
        attrs.insert(TimelineAttrKey::TraceCustomization, customization.into());

        for (k, v) in metadata.environment.entries() {
            attrs.insert(
                TimelineAttrKey::TraceEnv(k.to_owned()),
                match v {
                    EnvValue::Integer(int) => AttrVal::Integer(*int),
                    EnvValue::String(s) => AttrVal::String(s.clone()),
                },
            );
        }

        Self { attrs }
    }

    pub fn attr_kvs(&self) -> Vec<(TimelineAttrKey, AttrVal)> {
        self.attrs.clone().into_iter().collect()
    }
}
