use bilat_device::{ComputeDevice, HostDevice, MemFlags};

use crate::error::Error;
use crate::params::{GeometryDescriptor, MAX_RANK, upload};

#[test]
fn test_descriptor_layout() {
    assert_eq!(std::mem::size_of::<GeometryDescriptor>(), 104);

    let desc = GeometryDescriptor::contiguous([5, 4, 3, 2]).with_offset(9);
    let bytes = desc.as_bytes();
    assert_eq!(bytes.len(), 104);
    assert_eq!(bytes[0..8], 9i64.to_ne_bytes());
    assert_eq!(bytes[8..16], 5i64.to_ne_bytes());
    // in_strides[1]
    assert_eq!(bytes[48..56], 5i64.to_ne_bytes());
    // out_strides[3]
    assert_eq!(bytes[96..104], 60i64.to_ne_bytes());
}

#[test]
fn test_contiguous_strides_are_column_major() {
    let desc = GeometryDescriptor::contiguous([5, 4, 3, 2]);
    assert_eq!(desc.offset, 0);
    assert_eq!(desc.in_strides, [1, 5, 20, 60]);
    assert_eq!(desc.out_strides, desc.in_strides);
    assert_eq!(desc.elements(), 120);
}

#[test]
fn test_from_shape_pads_with_unit_extents() {
    let desc = GeometryDescriptor::from_shape(&[8, 6]).unwrap();
    assert_eq!(desc.dims, [8, 6, 1, 1]);
    assert_eq!(desc.in_strides, [1, 8, 48, 48]);
}

#[test]
fn test_from_shape_rejects_rank_above_four() {
    match GeometryDescriptor::from_shape(&[2, 2, 2, 2, 2]) {
        Err(Error::RankExceeded { rank, max }) => {
            assert_eq!(rank, 5);
            assert_eq!(max, MAX_RANK);
        }
        other => panic!("expected rank error, got {other:?}"),
    }
}

#[test]
fn test_from_bytes_requires_exact_length() {
    let desc = GeometryDescriptor::contiguous([3, 3, 1, 1]);
    assert!(GeometryDescriptor::from_bytes(&desc.as_bytes()[..100]).is_none());

    // Unaligned source.
    let mut shifted = vec![0u8; 105];
    shifted[1..].copy_from_slice(desc.as_bytes());
    assert_eq!(GeometryDescriptor::from_bytes(&shifted[1..]), Some(desc));
}

#[test]
fn test_upload_round_trips_through_device_memory() {
    let device = HostDevice::new(0);
    let desc = GeometryDescriptor::contiguous([20, 18, 2, 1])
        .with_offset(5)
        .with_in_strides([1, 24, 24 * 18, 24 * 18 * 2])
        .with_out_strides([18, 1, 360, 720]);

    let params = upload(&device, &desc).unwrap();
    assert_eq!(params.buffer().size(), 104);
    assert_eq!(params.buffer().flags(), MemFlags::ReadOnly);
    assert_eq!(device.pending(), 0);

    let mut bytes = [0u8; 104];
    device.read_buffer(params.buffer(), 0, &mut bytes).unwrap();
    assert_eq!(GeometryDescriptor::from_bytes(&bytes), Some(desc));
}

#[test]
fn test_upload_reports_allocation_failure_as_transfer() {
    let device = HostDevice::new(0).with_max_alloc_size(64);
    let desc = GeometryDescriptor::contiguous([4, 4, 1, 1]);
    match upload(&device, &desc) {
        Err(Error::Transfer { source }) => {
            assert!(matches!(source, bilat_device::Error::Allocation { size: 104, .. }), "{source}");
        }
        other => panic!("expected transfer error, got {other:?}"),
    }
}
