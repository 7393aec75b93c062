//! Integration tests for the handle-based session: import metadata, create
//! a dataset, edit it, and reopen it.

use bag::{
    allocate_buffer, null_value, BagConfig, BagError, LayerType, NullValue, OpenMode, Region, Session,
    TrackingItem, TrackingSort,
};
use test_utils::{
    assert_approx_eq, bytes_to_f32, create_depth_grid, f32_bytes, grid, require_test_file, sub_grid,
    temp_bag_path,
};

#[test]
fn test_create_from_sample_metadata() {
    let xml = require_test_file!("harbour_survey.xml");
    let (_dir, path) = temp_bag_path("harbour.bag");
    let spec = grid::HARBOUR_SURVEY;

    let mut session = Session::default();
    let handle = session.create_from_xml(&path, &xml).unwrap();
    assert_eq!(session.get_dims(handle).unwrap(), (spec.rows, spec.cols));

    let record = session.get_metadata(handle).unwrap();
    assert_eq!(record.file_identifier, "harbour-survey-2019-001");
    assert_eq!(record.horizontal_reference.definition, "EPSG:32619");
    assert_eq!(record.vertical_reference.definition, "MLLW");
    assert_eq!(record.lineage.len(), 1);

    let (x, y) = session.compute_position(handle, 10, 20).unwrap();
    assert_approx_eq!(x, spec.ll_x + 40.0, 1e-6);
    assert_approx_eq!(y, spec.ll_y + 80.0, 1e-6);
    assert_eq!(session.compute_index(handle, x + 1.5, y - 1.5).unwrap(), (10, 20));

    session.close(handle).unwrap();
    assert_eq!(session.open_count(), 0);
}

#[test]
fn test_edit_session_then_reopen() {
    let xml = require_test_file!("harbour_survey.xml");
    let (_dir, path) = temp_bag_path("edit.bag");
    let spec = grid::HARBOUR_SURVEY;
    let (rows, cols) = (spec.rows as usize, spec.cols as usize);
    let depths = create_depth_grid(rows, cols);

    let mut session = Session::new(BagConfig {
        chunk_size: 16,
        ..BagConfig::default()
    });
    let handle = session.create_from_xml(&path, &xml).unwrap();
    session
        .write(handle, LayerType::Elevation, &Region::full((spec.rows, spec.cols)), &f32_bytes(&depths))
        .unwrap();
    session.set_min_max(handle, LayerType::Elevation, -42.35, -5.0).unwrap();
    session
        .write_tracking_item(handle, TrackingItem::new(30, 2, -20.1, 0.5, 3, 0))
        .unwrap();
    session
        .write_tracking_item(handle, TrackingItem::new(5, 7, -7.8, 0.4, 1, 0))
        .unwrap();
    session.close(handle).unwrap();

    let handle = session.open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(session.dataset(handle).unwrap().chunk_dims(), Some((16, 16)));
    assert_eq!(
        session.get_min_max(handle, LayerType::Elevation).unwrap(),
        Some((-42.35, -5.0))
    );

    let region = Region::new(20, 10, 23, 13);
    let result = session.read(handle, LayerType::Elevation, &region, true).unwrap();
    assert_eq!(bytes_to_f32(&result.data), sub_grid(&depths, cols, 20, 10, 4, 4));
    let x = result.x.unwrap();
    let y = result.y.unwrap();
    assert_eq!(x.len(), 4);
    assert_eq!(y.len(), 4);
    assert_approx_eq!(x[0], spec.ll_x + 80.0, 1e-6);
    assert_approx_eq!(y[3], spec.ll_y + 52.0, 1e-6);

    assert_eq!(session.tracking_list_length(handle).unwrap(), 2);
    session.sort_tracking_list(handle, TrackingSort::Node).unwrap();
    assert_eq!(session.read_tracking_item(handle, 0).unwrap().row, 5);

    let err = session
        .write_tracking_item(handle, TrackingItem::new(0, 0, 0.0, 0.0, 0, 0))
        .unwrap_err();
    assert!(matches!(err, BagError::ReadOnly(_)));
}

#[test]
fn test_stale_handle_after_close() {
    let (_dir, path) = temp_bag_path("stale.bag");
    let spec = grid::SIMPLE_10X10;
    let record = bag::MetadataRecord::for_grid(
        (spec.rows, spec.cols),
        (spec.ll_x, spec.ll_y),
        (spec.row_resolution, spec.col_resolution),
    );

    let mut session = Session::default();
    let handle = session.create(&path, record).unwrap();
    session.close(handle).unwrap();

    let err = session.get_dims(handle).unwrap_err();
    assert!(matches!(err, BagError::InvalidHandle(_)));
    assert_eq!(bag::error_string(err.code()), bag::error_string(6));
    assert!(matches!(session.close(handle), Err(BagError::InvalidHandle(_))));

    let reopened = session.open(&path, OpenMode::ReadWrite).unwrap();
    assert_ne!(reopened, handle);
    assert_eq!(session.get_dims(reopened).unwrap(), (10, 10));
}

#[test]
fn test_buffer_helpers() {
    let region = Region::new(0, 0, 2, 3);
    assert_eq!(allocate_buffer(&region, LayerType::Uncertainty).len(), 3 * 4 * 4);
    assert_eq!(null_value(LayerType::Elevation), NullValue::Float(1_000_000.0));
    assert_eq!(null_value(LayerType::NumHypotheses), NullValue::UInt(0));
}
