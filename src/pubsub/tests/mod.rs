mod connection;
mod dispatcher;
mod network_message;
mod publish_state;

use std::sync::Arc;

use crate::{
    pubsub::{
        core::*,
        transport::NetworkMessageSink,
        uadp::{DataSetFieldContentMask, UadpDataSetMessageContentMask, UadpNetworkMessage},
    },
    sync::*,
    types::*,
};

pub const DATA_SET_NAME: &str = "Simple";

/// Metadata of a data set with one field of each common kind, including an array.
/// Field ids are fixed so that metadata built twice compares equal.
pub fn meta_data(major_version: u32, minor_version: u32) -> DataSetMetaData {
    let mut array_field = FieldMetaData::new("Int32Array", BuiltInType::Int32);
    array_field.value_rank = 1;
    let mut fields = vec![
        FieldMetaData::new("BoolToggle", BuiltInType::Boolean),
        FieldMetaData::new("Int32", BuiltInType::Int32),
        FieldMetaData::new("Double", BuiltInType::Double),
        FieldMetaData::new("String", BuiltInType::String),
        FieldMetaData::new("DateTime", BuiltInType::DateTime),
        array_field,
    ];
    for (i, field) in fields.iter_mut().enumerate() {
        field.data_set_field_id = Guid::from(uuid::Uuid::from_u128(i as u128 + 1));
    }
    DataSetMetaData::new(
        DATA_SET_NAME,
        fields,
        ConfigurationVersion::new(major_version, minor_version),
    )
}

pub fn field_values() -> Vec<Variant> {
    vec![
        Variant::from(true),
        Variant::from(-42i32),
        Variant::from(3.5f64),
        Variant::from("Hello"),
        Variant::from(DateTime::from(132_000_000_000_000_000i64)),
        Variant::from(
            Array::new(
                BuiltInType::Int32,
                vec![Variant::from(1i32), Variant::from(2i32), Variant::from(3i32)],
            )
            .unwrap(),
        ),
    ]
}

pub fn data_set(meta_data: &DataSetMetaData) -> DataSet {
    let fields = meta_data
        .fields
        .iter()
        .zip(field_values())
        .map(|(f, v)| Field::new(f.name.clone(), DataValue::value_only(v)))
        .collect();
    DataSet::new(meta_data.clone(), fields)
}

/// The node each field of the test data set is published from.
pub fn published_variables() -> Vec<NodeId> {
    (1..=6).map(|i| NodeId::new(1, i as u32)).collect()
}

/// A data store holding the test values and a collector publishing them as the test data set.
pub fn collector(meta_data: DataSetMetaData) -> (Arc<DataStore>, Arc<DataStoreCollector>) {
    let data_store = Arc::new(DataStore::new());
    for (node_id, value) in published_variables().iter().zip(field_values()) {
        data_store.write_value(node_id, DataValue::value_only(value));
    }
    let collector = Arc::new(DataStoreCollector::new(
        data_store.clone(),
        vec![PublishedDataSet::new(meta_data, published_variables())],
    ));
    (data_store, collector)
}

/// A publishing UDP connection with one writer group of id 100 holding the given writers.
pub fn publisher_config(writers: Vec<DataSetWriter>) -> PubSubConnectionConfig {
    let mut config = PubSubConnectionConfig::new(
        "Publisher",
        UDP_UADP_TRANSPORT_PROFILE,
        "opc.udp://239.0.0.1:4840",
    );
    config.publisher_id = Some(PublisherId::UInt16(1));
    let mut writer_group = WriterGroup::new("Group", 100, 100.0);
    for writer in writers {
        writer_group.add_writer(writer);
    }
    config.writer_groups.push(writer_group);
    config
}

/// A subscribing UDP connection with the given readers.
pub fn subscriber_config(readers: Vec<DataSetReader>) -> PubSubConnectionConfig {
    let mut config = PubSubConnectionConfig::new(
        "Subscriber",
        UDP_UADP_TRANSPORT_PROFILE,
        "opc.udp://239.0.0.1:4840",
    );
    config.reader_groups.push(ReaderGroup::new("Readers", readers));
    config
}

pub fn writer(
    data_set_writer_id: u16,
    field_content_mask: DataSetFieldContentMask,
    message_content_mask: UadpDataSetMessageContentMask,
) -> DataSetWriter {
    let mut writer = DataSetWriter::new("Writer", data_set_writer_id, DATA_SET_NAME);
    writer.data_set_field_content_mask = field_content_mask;
    writer.data_set_message_content_mask = message_content_mask;
    writer
}

pub fn reader(
    publisher_id: Option<PublisherId>,
    writer_group_id: u16,
    data_set_writer_id: u16,
    meta_data: DataSetMetaData,
) -> DataSetReader {
    DataSetReader::new(
        "Reader",
        publisher_id,
        writer_group_id,
        data_set_writer_id,
        meta_data,
    )
}

/// A sink that keeps what is sent.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(UadpNetworkMessage, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<UadpNetworkMessage> {
        trace_lock!(self.messages)
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn take(&self) -> Vec<(UadpNetworkMessage, Vec<u8>)> {
        std::mem::take(&mut *trace_lock!(self.messages))
    }

    pub fn len(&self) -> usize {
        trace_lock!(self.messages).len()
    }
}

impl NetworkMessageSink for MemorySink {
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool {
        trace_lock!(self.messages).push((message.clone(), bytes.to_vec()));
        true
    }
}
