use crate::{
    pubsub::{
        core::*,
        tests::*,
        uadp::{DataSetFieldContentMask, UadpDataSetMessageContentMask},
    },
    types::*,
};

fn key_frame_writer(key_frame_count: u32) -> DataSetWriter {
    let mut writer = writer(
        1,
        DataSetFieldContentMask::empty(),
        UadpDataSetMessageContentMask::SEQUENCE_NUMBER,
    );
    writer.key_frame_count = key_frame_count;
    writer
}

/// The test data set with its Int32 field set to `value`.
fn sample(meta_data: &DataSetMetaData, value: i32) -> DataSet {
    let mut data_set = data_set(meta_data);
    data_set.fields[1] = Some(Field::new(
        "Int32",
        DataValue::value_only(Variant::from(value)),
    ));
    data_set
}

/// Runs one publishing interval and returns what would be sent.
fn publish(
    state: &mut WriterGroupPublishState,
    writer: &DataSetWriter,
    data_set: DataSet,
) -> Option<DataSet> {
    let data_set = state.exclude_unchanged_fields(writer, data_set)?;
    state.on_message_published(writer, &data_set);
    Some(data_set)
}

#[test]
fn key_frame_cycle() {
    let meta_data = meta_data(1, 1);
    let writer = key_frame_writer(3);
    let mut state = WriterGroupPublishState::new();
    assert!(state.has_meta_data_changed(&writer, &meta_data));
    assert!(!state.has_meta_data_changed(&writer, &meta_data));

    for i in 0..7 {
        let expect_delta = i % 3 != 0;
        assert_eq!(state.is_delta_frame(&writer), expect_delta, "message {}", i);
        let sent = publish(&mut state, &writer, sample(&meta_data, i)).unwrap();
        assert_eq!(sent.is_delta(), expect_delta, "message {}", i);
        if expect_delta {
            // Only the field that changed is carried
            let present = sent.present_fields().map(|(i, _)| i).collect::<Vec<_>>();
            assert_eq!(present, vec![1]);
            assert_eq!(
                sent.fields[1].as_ref().unwrap().value.value,
                Some(Variant::from(i))
            );
        } else {
            assert_eq!(sent.present_fields().count(), 6);
        }
    }
    assert_eq!(state.message_count(1), 7);
}

#[test]
fn unchanged_delta_frame_is_skipped() {
    let meta_data = meta_data(1, 1);
    let writer = key_frame_writer(3);
    let mut state = WriterGroupPublishState::new();
    state.has_meta_data_changed(&writer, &meta_data);

    assert!(publish(&mut state, &writer, sample(&meta_data, 1)).is_some());
    // Nothing changed, nothing to send but the cycle moves on
    assert!(publish(&mut state, &writer, sample(&meta_data, 1)).is_none());
    assert_eq!(state.message_count(1), 2);
    assert!(state.is_delta_frame(&writer));
    assert!(publish(&mut state, &writer, sample(&meta_data, 2)).unwrap().is_delta());
    assert!(!state.is_delta_frame(&writer));
}

#[test]
fn status_change_is_a_change() {
    let meta_data = meta_data(1, 1);
    let writer = key_frame_writer(2);
    let mut state = WriterGroupPublishState::new();
    state.has_meta_data_changed(&writer, &meta_data);
    publish(&mut state, &writer, sample(&meta_data, 1));

    let mut data_set = sample(&meta_data, 1);
    data_set.fields[2].as_mut().unwrap().value.status = Some(StatusCode::BadNoData);
    let sent = publish(&mut state, &writer, data_set).unwrap();
    let present = sent.present_fields().map(|(i, _)| i).collect::<Vec<_>>();
    assert_eq!(present, vec![2]);
}

#[test]
fn meta_data_change_restarts_cycle() {
    let writer = key_frame_writer(4);
    let mut state = WriterGroupPublishState::new();
    let version1 = meta_data(1, 1);
    state.has_meta_data_changed(&writer, &version1);
    publish(&mut state, &writer, sample(&version1, 1));
    publish(&mut state, &writer, sample(&version1, 2));
    assert!(state.is_delta_frame(&writer));

    let version2 = meta_data(2, 1);
    assert!(state.has_meta_data_changed(&writer, &version2));
    assert!(!state.is_delta_frame(&writer));
    assert_eq!(state.message_count(1), 0);
    let sent = publish(&mut state, &writer, sample(&version2, 2)).unwrap();
    assert!(!sent.is_delta());
}

#[test]
fn every_message_is_a_key_frame() {
    let meta_data = meta_data(1, 1);
    for key_frame_count in [0, 1] {
        let writer = key_frame_writer(key_frame_count);
        let mut state = WriterGroupPublishState::new();
        state.has_meta_data_changed(&writer, &meta_data);
        for i in 0..3 {
            assert!(!state.is_delta_frame(&writer));
            // Even identical values are sent again
            let sent = publish(&mut state, &writer, sample(&meta_data, 5)).unwrap();
            assert!(!sent.is_delta(), "message {}", i);
        }
    }
}

#[test]
fn writers_are_tracked_separately() {
    let meta_data = meta_data(1, 1);
    let first = key_frame_writer(2);
    let mut second = key_frame_writer(2);
    second.data_set_writer_id = 2;
    let mut state = WriterGroupPublishState::new();
    state.has_meta_data_changed(&first, &meta_data);
    assert!(state.has_meta_data_changed(&second, &meta_data));

    publish(&mut state, &first, sample(&meta_data, 1));
    assert!(state.is_delta_frame(&first));
    assert!(!state.is_delta_frame(&second));
    assert_eq!(state.message_count(2), 0);
}
