//! End-to-end conversion tests on CIFAR-10 shaped record files
//!
//! Fixtures are generated on the fly with the real 32x32x3 layout and a handful
//! of records per split.

use cifar_topk::cifar::{read_split_file, write_split, DatasetSplit, CIFAR10};
use cifar_topk::config::{ConvertConfig, SplitConfig};
use cifar_topk::container::{
    load_batches, load_container, DATA_COLUMN, SPARSE_END_COLUMN, SPARSE_INDEX_COLUMN,
    SPARSE_START_COLUMN,
};
use cifar_topk::convert::run;
use cifar_topk::fsutil::{is_container_file, list_files, CONTAINER_FILE_EXTENSION};
use cifar_topk::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn fixture(examples: usize, seed: u8) -> DatasetSplit {
    let pixels: Vec<u8> = (0..examples * CIFAR10.image_size())
        .map(|i| u8::try_from(i % 256).unwrap().wrapping_add(seed))
        .collect();
    let labels: Vec<u32> = (0..examples).map(|i| u32::try_from((i * 3) % 10).unwrap()).collect();
    DatasetSplit::new(CIFAR10, pixels, labels).unwrap()
}

fn write_fixture(path: &Path, split: &DatasetSplit) {
    write_split(fs::File::create(path).unwrap(), split).unwrap();
}

fn small_config(input: &Path, output: &Path, training: Option<usize>, test: Option<usize>) -> ConvertConfig {
    ConvertConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        training: SplitConfig {
            examples: training,
            ..ConvertConfig::default().training
        },
        test: SplitConfig {
            examples: test,
            ..ConvertConfig::default().test
        },
        ..ConvertConfig::default()
    }
}

#[test]
fn test_records_round_trip_through_containers() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let training = fixture(12, 0);
    let test = fixture(4, 100);
    write_fixture(&input.path().join("training.bin"), &training);
    write_fixture(&input.path().join("test.bin"), &test);

    let config = small_config(input.path(), output.path(), Some(12), Some(4));
    let (report, _) = run(&config).unwrap();
    assert_eq!(report.splits.len(), 2);

    let loaded = load_container(output.path().join("cifar10_training.parquet")).unwrap();
    assert_eq!(loaded.split, training);
    assert_eq!(loaded.attributes.examples, 12);
    assert_eq!(loaded.attributes.layout().unwrap(), CIFAR10);

    let loaded = load_container(output.path().join("cifar10_test.parquet")).unwrap();
    assert_eq!(loaded.split, test);

    // Re-encoding the loaded split reproduces the original bytes
    let original = fs::read(input.path().join("test.bin")).unwrap();
    let mut encoded = Vec::new();
    write_split(&mut encoded, &loaded.split).unwrap();
    assert_eq!(encoded, original);
}

#[test]
fn test_container_columns_and_attributes() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_fixture(&input.path().join("training.bin"), &fixture(5, 1));
    write_fixture(&input.path().join("test.bin"), &fixture(2, 2));

    run(&small_config(input.path(), output.path(), Some(5), Some(2))).unwrap();

    let (schema, batches) = load_batches(output.path().join("cifar10_training.parquet")).unwrap();
    let metadata = schema.metadata();
    for (key, value) in [
        ("datasets", "2"),
        ("name0", "input"),
        ("name1", "output"),
        ("attributes0", "0"),
        ("attributes1", "3"),
        ("kind0", "1"),
        ("kind1", "0"),
        ("dataType0", "8"),
        ("dataType1", "0"),
        ("dimensions0", "3"),
        ("dimensions1", "1"),
        ("width0", "32"),
        ("height0", "32"),
        ("length0", "3"),
        ("width1", "10"),
        ("examplesDim0", "5"),
        ("examplesDim1", "5"),
        ("sparseDataDim1", "5"),
        ("dataDim0", "15360"),
    ] {
        assert_eq!(metadata.get(key).map(String::as_str), Some(value), "attribute {key}");
    }
    assert_eq!(metadata.len(), 19);

    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec![DATA_COLUMN, SPARSE_START_COLUMN, SPARSE_END_COLUMN, SPARSE_INDEX_COLUMN]
    );
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 5);

    let loaded = load_container(output.path().join("cifar10_training.parquet")).unwrap();
    let sparse = loaded.split.sparse_labels().unwrap();
    assert_eq!(sparse.start, vec![0, 1, 2, 3, 4]);
    assert_eq!(sparse.end, vec![1, 2, 3, 4, 5]);
    assert_eq!(sparse.index, vec![0, 3, 6, 9, 2]);
}

#[test]
fn test_inferred_counts_convert_whole_files() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_fixture(&input.path().join("training.bin"), &fixture(7, 0));
    write_fixture(&input.path().join("test.bin"), &fixture(3, 0));

    let (report, _) = run(&small_config(input.path(), output.path(), None, None)).unwrap();
    let counts: Vec<usize> = report.splits.iter().map(|s| s.examples).collect();
    assert_eq!(counts, vec![7, 3]);
}

#[test]
fn test_configured_count_reads_prefix() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let training = fixture(6, 0);
    write_fixture(&input.path().join("training.bin"), &training);
    write_fixture(&input.path().join("test.bin"), &fixture(2, 0));

    run(&small_config(input.path(), output.path(), Some(4), None)).unwrap();

    let loaded = load_container(output.path().join("cifar10_training.parquet")).unwrap();
    assert_eq!(loaded.split.examples(), 4);
    assert_eq!(loaded.split.labels(), &training.labels()[..4]);
    assert_eq!(loaded.split.image(3), training.image(3));
}

#[test]
fn test_truncated_input_fails() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_fixture(&input.path().join("training.bin"), &fixture(3, 0));
    write_fixture(&input.path().join("test.bin"), &fixture(1, 0));

    let err = run(&small_config(input.path(), output.path(), Some(4), Some(1))).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    assert!(err.to_string().contains("too short for 4 records"));
}

#[test]
fn test_oversized_count_fails_without_allocating() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_fixture(&input.path().join("training.bin"), &fixture(1, 0));
    write_fixture(&input.path().join("test.bin"), &fixture(1, 0));

    let config = small_config(input.path(), output.path(), Some(usize::MAX / 4), Some(1));
    let err = run(&config).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    assert!(err.to_string().contains("too short"));
}

#[test]
fn test_partial_trailing_record_fails_when_inferring() {
    let input = tempdir().unwrap();
    let path = input.path().join("training.bin");
    let mut bytes = Vec::new();
    write_split(&mut bytes, &fixture(2, 0)).unwrap();
    bytes.extend_from_slice(&[1, 2, 3]);
    fs::write(&path, bytes).unwrap();

    let err = read_split_file(&path, CIFAR10, None).unwrap_err();
    assert!(err.to_string().contains("not a multiple"));
}

#[test]
fn test_label_out_of_range_fails() {
    let input = tempdir().unwrap();
    let path = input.path().join("training.bin");
    let mut bytes = Vec::new();
    write_split(&mut bytes, &fixture(2, 0)).unwrap();
    let second_label = CIFAR10.record_size();
    bytes[second_label] = 10;
    fs::write(&path, bytes).unwrap();

    let err = read_split_file(&path, CIFAR10, Some(2)).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    assert!(err.to_string().contains("example 1"));
}

#[test]
fn test_outputs_are_detected_as_containers() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_fixture(&input.path().join("training.bin"), &fixture(2, 0));
    write_fixture(&input.path().join("test.bin"), &fixture(2, 0));

    let config = ConvertConfig {
        metrics_out: Some(output.path().join("metrics.jsonl")),
        ..small_config(input.path(), output.path(), None, None)
    };
    run(&config).unwrap();

    let containers: Vec<_> = list_files(output.path(), false)
        .unwrap()
        .into_iter()
        .filter(|path| is_container_file(path))
        .collect();
    assert_eq!(containers.len(), 2);
    for path in &containers {
        assert!(path.to_string_lossy().ends_with(CONTAINER_FILE_EXTENSION));
    }
    assert!(!is_container_file(output.path().join("metrics.jsonl")));
}
