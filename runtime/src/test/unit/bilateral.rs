use bilat_device::{ArgKind, ComputeDevice, DeviceManager, HostDevice, KernelArg, manager};

use super::{buffer_from, host_setup, read_back, zeroed};
use crate::bilateral::{Bilateral, bilateral};
use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::kernel_cache::ProgramCache;
use crate::params::GeometryDescriptor;

fn image(width: usize, height: usize, pixel: impl Fn(usize, usize) -> f32) -> Vec<f32> {
    (0..height).flat_map(|y| (0..width).map(move |x| (x, y))).map(|(x, y)| pixel(x, y)).collect()
}

#[test]
fn test_launch_is_deferred_until_finish() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let input = buffer_from(&*device, &vec![1.0f32; 16 * 16]);
    let out = zeroed::<f32>(&*device, 16 * 16);
    let desc = GeometryDescriptor::contiguous([16, 16, 1, 1]);

    Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 1.0, 0.5).unwrap();
    assert_eq!(device.pending(), 1);
    assert_eq!(device.stats().executed, 0);

    device.finish().unwrap();
    assert_eq!(device.pending(), 0);
    assert_eq!(device.stats().executed, 1);
}

#[test]
fn test_constant_image_stays_constant() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let dispatch = Bilateral::new(&manager, &cache);

    let (width, height, slices) = (40, 24, 2);
    let len = width * height * slices;
    let desc = GeometryDescriptor::contiguous([width as i64, height as i64, slices as i64, 1]);

    let input = buffer_from(&*device, &vec![0.5f32; len]);
    let out = zeroed::<f32>(&*device, len);
    dispatch.run::<f32, false>(&out, &input, &desc, 2.0, 0.1).unwrap();
    let filtered = read_back::<f32>(&*device, &out);
    assert!(filtered.iter().all(|v| (v - 0.5).abs() < 1e-6), "{filtered:?}");

    let input = buffer_from(&*device, &vec![200u8; len]);
    let out = zeroed::<u8>(&*device, len);
    dispatch.run::<u8, false>(&out, &input, &desc, 2.0, 10.0).unwrap();
    assert!(read_back::<u8>(&*device, &out).iter().all(|&v| v == 200));
}

#[test]
fn test_strong_edges_are_preserved() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let step = image(32, 32, |x, _| if x < 16 { 0.0 } else { 1.0 });

    let input = buffer_from(&*device, &step);
    let out = zeroed::<f32>(&*device, step.len());
    let desc = GeometryDescriptor::contiguous([32, 32, 1, 1]);
    Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 2.0, 0.05).unwrap();

    let filtered = read_back::<f32>(&*device, &out);
    for (index, (&before, &after)) in step.iter().zip(&filtered).enumerate() {
        assert!((before - after).abs() < 1e-3, "pixel {index}: {before} became {after}");
    }
}

#[test]
fn test_wide_color_sigma_smooths_noise() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let checker = image(32, 32, |x, y| ((x + y) % 2) as f32);

    let input = buffer_from(&*device, &checker);
    let out = zeroed::<f32>(&*device, checker.len());
    let desc = GeometryDescriptor::contiguous([32, 32, 1, 1]);
    Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 1.0, 10.0).unwrap();

    let filtered = read_back::<f32>(&*device, &out);
    for y in 2..30 {
        for x in 2..30 {
            let value = filtered[y * 32 + x];
            assert!((0.3..0.7).contains(&value), "({x}, {y}) = {value}");
        }
    }
}

#[test]
fn test_color_filters_every_channel() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let dispatch = Bilateral::new(&manager, &cache);

    let plane = 16 * 16;
    let pixels: Vec<f32> = (0..3).flat_map(|c| std::iter::repeat_n((c + 1) as f32 * 10.0, plane)).collect();
    let input = buffer_from(&*device, &pixels);
    let desc = GeometryDescriptor::contiguous([16, 16, 1, 3]);

    let color = zeroed::<f32>(&*device, pixels.len());
    dispatch.run::<f32, true>(&color, &input, &desc, 1.0, 0.5).unwrap();
    let filtered = read_back::<f32>(&*device, &color);
    for (channel, values) in filtered.chunks(plane).enumerate() {
        let expected = (channel + 1) as f32 * 10.0;
        assert!(values.iter().all(|v| (v - expected).abs() < 1e-4), "channel {channel}");
    }

    let gray = zeroed::<f32>(&*device, pixels.len());
    dispatch.run::<f32, false>(&gray, &input, &desc, 1.0, 0.5).unwrap();
    let filtered = read_back::<f32>(&*device, &gray);
    assert!(filtered[..plane].iter().all(|v| (v - 10.0).abs() < 1e-4));
    assert!(filtered[plane..].iter().all(|&v| v == 0.0));

    let ranges: Vec<_> = device.launch_records().iter().map(|record| record.range.global).collect();
    assert_eq!(ranges, [[48, 16], [16, 16]]);
    assert_eq!(device.stats().compilations, 1);
}

#[test]
fn test_launch_arguments_follow_kernel_order() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let len = 40 * 24;
    let input = buffer_from(&*device, &vec![0.0f32; len]);
    let out = zeroed::<f32>(&*device, len);
    let desc = GeometryDescriptor::contiguous([40, 24, 1, 1]);

    Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 0.5, 0.1).unwrap();

    let records = device.launch_records();
    let record = &records[0];
    assert_eq!(record.kernel, "bilateral");
    assert_eq!(record.range.global, [48, 32]);
    assert_eq!(record.range.local, [16, 16]);

    let kinds: Vec<_> = record.args.iter().map(KernelArg::kind).collect();
    assert_eq!(
        kinds,
        [
            ArgKind::Buffer { bytes: len * 4 },
            ArgKind::Buffer { bytes: len * 4 },
            ArgKind::Local { bytes: 324 * 4 },
            ArgKind::Local { bytes: 9 * 4 },
            ArgKind::Buffer { bytes: 104 },
            ArgKind::F32,
            ArgKind::F32,
            ArgKind::I64,
            ArgKind::I64,
        ]
    );
    assert!(matches!(record.args[0], KernelArg::Buffer(ref b) if b.same_allocation(&out)));
    assert!(matches!(record.args[1], KernelArg::Buffer(ref b) if b.same_allocation(&input)));
    assert!(matches!(record.args[5], KernelArg::F32(s) if s == 0.5));
    assert!(matches!(record.args[6], KernelArg::F32(c) if c == 0.1));
    assert!(matches!(record.args[7], KernelArg::I64(324)));
    assert!(matches!(record.args[8], KernelArg::I64(3)));
}

#[test]
fn test_repeat_dispatch_reuses_compiled_kernel() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let dispatch = Bilateral::new(&manager, &cache);
    let pixels = image(24, 20, |x, y| ((x * 7 + y * 13) % 11) as f32 / 10.0);
    let input = buffer_from(&*device, &pixels);
    let desc = GeometryDescriptor::contiguous([24, 20, 1, 1]);

    let first = zeroed::<f32>(&*device, pixels.len());
    let second = zeroed::<f32>(&*device, pixels.len());
    dispatch.run::<f32, false>(&first, &input, &desc, 1.5, 0.3).unwrap();
    dispatch.run::<f32, false>(&second, &input, &desc, 1.5, 0.3).unwrap();

    assert_eq!(read_back::<f32>(&*device, &first), read_back::<f32>(&*device, &second));
    let stats = device.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.launches, 2);
}

#[test]
fn test_strided_input_matches_contiguous() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let dispatch = Bilateral::new(&manager, &cache);
    let (width, height, pitch, offset) = (20usize, 18usize, 24usize, 5usize);
    let pixel = |x: usize, y: usize| ((x * 7 + y * 13) % 11) as f32 / 10.0;

    let dense = image(width, height, pixel);
    let mut padded = vec![-1.0f32; offset + pitch * height];
    for y in 0..height {
        for x in 0..width {
            padded[offset + y * pitch + x] = pixel(x, y);
        }
    }

    let desc = GeometryDescriptor::contiguous([width as i64, height as i64, 1, 1]);
    let strided = desc.with_offset(offset as i64).with_in_strides([1, pitch as i64, (pitch * height) as i64, 0]);

    let expected = zeroed::<f32>(&*device, dense.len());
    dispatch.run::<f32, false>(&expected, &buffer_from(&*device, &dense), &desc, 1.0, 0.2).unwrap();
    let actual = zeroed::<f32>(&*device, dense.len());
    dispatch.run::<f32, false>(&actual, &buffer_from(&*device, &padded), &strided, 1.0, 0.2).unwrap();

    assert_eq!(read_back::<f32>(&*device, &actual), read_back::<f32>(&*device, &expected));
}

#[test]
fn test_zero_extent_is_not_submitted() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let input = buffer_from(&*device, &[1.0f32; 16]);
    let out = buffer_from(&*device, &[7.0f32; 16]);
    let desc = GeometryDescriptor::contiguous([0, 16, 1, 1]);

    Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 1.0, 0.1).unwrap();
    assert_eq!(device.stats().launches, 0);
    assert_eq!(device.pending(), 0);
    assert_eq!(read_back::<f32>(&*device, &out), [7.0f32; 16]);
}

#[test]
fn test_missing_active_device() {
    let manager = DeviceManager::new();
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let device = HostDevice::new(0);
    let buffer = zeroed::<f32>(&device, 4);
    let desc = GeometryDescriptor::contiguous([2, 2, 1, 1]);

    let result = Bilateral::new(&manager, &cache).run::<f32, false>(&buffer, &buffer, &desc, 1.0, 0.1);
    match result {
        Err(Error::InvalidDevice { source }) => {
            assert!(matches!(source, bilat_device::Error::InvalidDevice { id: 0, count: 0 }), "{source}");
        }
        other => panic!("expected invalid device, got {other:?}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn test_compile_failure_is_reported_on_every_call() {
    let (device, manager) = host_setup(HostDevice::new(0));
    let config = RuntimeConfig { extra_build_options: bilat_device::BuildOptions::new().define("dim_type", "size_t") };
    let cache = ProgramCache::new(&config);
    let input = buffer_from(&*device, &[0i32; 16]);
    let out = zeroed::<i32>(&*device, 16);
    let desc = GeometryDescriptor::contiguous([4, 4, 1, 1]);

    for _ in 0..3 {
        let error = Bilateral::new(&manager, &cache).run::<i32, false>(&out, &input, &desc, 1.0, 0.1).unwrap_err();
        assert!(matches!(&error, Error::Compile { log, .. } if log.contains("size_t")), "{error}");
    }
    let stats = device.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.launches, 0);
}

#[test]
fn test_descriptor_upload_failure() {
    let (device, manager) = host_setup(HostDevice::new(0).with_max_alloc_size(100));
    let cache = ProgramCache::new(&RuntimeConfig::default());
    let input = buffer_from(&*device, &[0.0f32; 16]);
    let out = zeroed::<f32>(&*device, 16);
    let desc = GeometryDescriptor::contiguous([4, 4, 1, 1]);

    let error = Bilateral::new(&manager, &cache).run::<f32, false>(&out, &input, &desc, 1.0, 0.1).unwrap_err();
    assert!(matches!(error, Error::Transfer { .. }), "{error}");
    assert_eq!(device.stats().launches, 0);
}

#[test]
fn test_global_entry_point() {
    let device = manager().active_device().unwrap();
    let pixels = vec![3.0f32; 18 * 10];
    let input = buffer_from(device.as_ref(), &pixels);
    let out = zeroed::<f32>(device.as_ref(), pixels.len());
    let desc = GeometryDescriptor::contiguous([18, 10, 1, 1]);

    bilateral::<f32, false>(&out, &input, &desc, 1.0, 0.1).unwrap();
    let filtered = read_back::<f32>(device.as_ref(), &out);
    assert!(filtered.iter().all(|v| (v - 3.0).abs() < 1e-5));
}
