use assert_fs::prelude::*;
use assert_fs::TempDir;
use ndarray::{arr1, arr2, Array4};
use num_complex::Complex;
use predicates::prelude::*;

use arrayio::{
    chi_square, euclidean_distance, inspect, normalized_scalar_product, Array, ArrayData, Arrayset,
    DistanceMetric, ElementType, Error,
};

#[test]
fn test_distance_properties() {
    let x = arr1(&[1.0, 5.0, 0.0, 2.5]);
    let y = arr1(&[0.5, 1.0, 3.0, 2.0]);

    for metric in DistanceMetric::ALL {
        let xy = metric.compute(x.view(), y.view()).unwrap();
        let yx = metric.compute(y.view(), x.view()).unwrap();
        assert!((xy - yx).abs() < 1e-12, "{} is not symmetric", metric);
    }

    assert_eq!(euclidean_distance(x.view(), x.view()).unwrap(), 0.0);
    assert!(normalized_scalar_product(x.view(), x.view()).unwrap().abs() < 1e-12);
    assert!(normalized_scalar_product(x.view(), y.view()).unwrap() > 0.0);
    assert_eq!(chi_square(x.view(), x.view()).unwrap(), 0.0);
    assert!(chi_square(x.view(), y.view()).unwrap() >= 0.0);
    assert_eq!("chi2".parse::<DistanceMetric>().unwrap(), DistanceMetric::ChiSquare);
}

#[test]
fn test_every_codec_round_trips() {
    let dir = TempDir::new().unwrap();
    let samples = vec![
        ArrayData::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]).unwrap(),
        ArrayData::from_array(arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap(),
    ];
    let wide = vec![
        ArrayData::from_array(Array4::from_shape_fn((2, 3, 2, 2), |(a, b, c, d)| {
            (a * 12 + b * 4 + c * 2 + d) as f64
        }))
        .unwrap(),
        ArrayData::from_vec(vec![Complex::new(1.0f64, 2.0), Complex::new(-3.0, 0.5)]).unwrap(),
    ];

    for ext in ["bin", "mat", "bindata"] {
        let supported: Vec<&ArrayData> = if ext == "bindata" {
            samples.iter().collect()
        } else {
            samples.iter().chain(wide.iter()).collect()
        };
        for (i, data) in supported.into_iter().enumerate() {
            let file = dir.child(format!("sample_{}.{}", i, ext));
            let mut array = Array::new(data.clone());
            array.save(file.path()).unwrap();
            file.assert(predicate::path::is_file());

            let reopened = Array::open(file.path()).unwrap();
            assert_eq!(reopened.type_info(), data.type_info(), "{}", file.path().display());
            assert_eq!(reopened.data().unwrap().into_owned(), *data);
        }
    }
}

#[test]
fn test_array_lifecycle() {
    let dir = TempDir::new().unwrap();
    let first = dir.child("first.bin");
    let second = dir.child("second.bin");
    let values = arr1(&[1.0f64, 2.0, 3.0, 4.0]).into_dyn();

    let mut array = Array::try_from(values.clone()).unwrap();
    assert!(array.is_loaded());

    array.save(first.path()).unwrap();
    assert!(!array.is_loaded());
    assert_eq!(array.get::<f64>().unwrap(), values);
    assert!(!array.is_loaded());

    array.save(second.path()).unwrap();
    assert_eq!(array.filename(), Some(second.path()));
    first.assert(predicate::path::exists());

    array.load().unwrap();
    assert!(array.is_loaded());
    assert!(array.codec().is_none());

    let as_u8 = array.cast::<u8>().unwrap();
    let as_f32 = array.cast::<f32>().unwrap();
    assert!(as_u8.iter().zip(as_f32.iter()).all(|(a, b)| *a as f32 == *b));
}

#[test]
fn test_arraysets_through_files() {
    let dir = TempDir::new().unwrap();
    let mut set = Arrayset::new();
    for i in 0..5 {
        set.add(ArrayData::from_vec(vec![i as f32; 3]).unwrap()).unwrap();
    }
    set.remove(2).unwrap();

    let mat = dir.child("set.mat");
    set.save(mat.path()).unwrap();
    let reopened = Arrayset::open(mat.path()).unwrap();
    assert_eq!(reopened.ids(), vec![1, 3, 4, 5]);
    assert_eq!(reopened.get(4).unwrap(), ArrayData::from_vec(vec![3.0f32; 3]).unwrap());

    let bindata = dir.child("set.bindata");
    set.save(bindata.path()).unwrap();
    let dense = Arrayset::open(bindata.path()).unwrap();
    assert_eq!(dense.ids(), vec![1, 2, 3, 4]);
    assert_eq!(dense.get(4).unwrap(), set.get(5).unwrap());
    assert_eq!(dense.type_info().unwrap().dtype, ElementType::Float32);
}

#[test]
fn test_inspect_reports_codec_and_type() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("frames.bindata");
    let data = ArrayData::from_array(arr2(&[[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]])).unwrap();
    Array::new(data).save(file.path()).unwrap();

    let report = inspect(file.path()).unwrap();
    assert_eq!(report.codec, "torch3.binary");
    assert_eq!(report.type_info.shape, vec![3, 2]);
    assert_eq!(report.arrayset_len, Some(3));

    let unknown = dir.child("notes.txt");
    unknown.write_str("not an array").unwrap();
    assert!(matches!(inspect(unknown.path()), Err(Error::UnknownCodec(_))));
}
