// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, sync::Arc, time::Duration};

use tombstone_cdc::{FileChangeStream, FileCheckpointStore, MemoryChangeStream, MemoryCheckpointStore, StartingPosition};
use tombstone_export::{ExportConfig, Exporter};
use tombstone_sink::{DeliveryMode, DirectorySink, MemorySink, SinkError};
use tombstone_testing::{TempDir, record, util::wait_for};
use tombstone_type::{Error, MockClock, PartitionId, SequenceToken};

fn config() -> ExportConfig {
	ExportConfig::default()
		.starting_position(StartingPosition::Earliest)
		.retry(3, 1, 2)
		.poll_interval_ms(5)
		.tick_interval_ms(5)
}

fn ids(sink: &MemorySink) -> Vec<String> {
	sink.events().into_iter().map(|event| event.id).collect()
}

#[tokio::test]
async fn test_run_until_partitions_close() {
	let stream = MemoryChangeStream::new();
	stream.extend("p0", record::removes(&["a", "b", "c"], "user", 1));
	stream.extend("p1", vec![record::insert("x", "user", 1), record::remove("d", "order", 2)]);
	stream.close("p0");
	stream.close("p1");

	let sink = MemorySink::new();
	let checkpoints = MemoryCheckpointStore::new();
	let exporter =
		Exporter::new(config(), Arc::new(stream), Arc::new(sink.clone()), Arc::new(checkpoints.clone()));

	let report = exporter.run().await.unwrap();

	assert!(report.is_clean());
	assert_eq!(report.outcomes.len(), 2);
	assert_eq!(checkpoints.get(&PartitionId::new("p0")), Some(SequenceToken::from(3)));
	assert_eq!(checkpoints.get(&PartitionId::new("p1")), Some(SequenceToken::from(2)));

	let mut delivered = ids(&sink);
	delivered.sort();
	assert_eq!(delivered, vec!["a", "b", "c", "d"]);

	let p1 = &report.metrics[&PartitionId::new("p1")];
	assert_eq!(p1.records_pulled, 2);
	assert_eq!(p1.not_applicable, 1);
	assert_eq!(p1.events_delivered, 1);
}

#[tokio::test]
async fn test_failed_partition_does_not_stop_others() {
	let stream = MemoryChangeStream::new();
	stream.extend("p0", record::removes(&["a", "b", "c"], "user", 1));
	stream.extend("p1", record::removes(&["d", "e"], "user", 1));
	stream.close("p0");
	stream.close("p1");

	let sink = MemorySink::new();
	sink.fail_record("evt-b", SinkError::PermissionDenied("denied".into()), usize::MAX);
	let checkpoints = MemoryCheckpointStore::new();
	let exporter = Exporter::new(
		config().delivery_mode(DeliveryMode::Streamed).flush_retry_attempts(2),
		Arc::new(stream),
		Arc::new(sink.clone()),
		Arc::new(checkpoints.clone()),
	);

	let report = exporter.run().await.unwrap();

	assert!(!report.is_clean());
	let failed: Vec<_> = report.failed().collect();
	assert_eq!(failed.len(), 1);
	assert_eq!(failed[0].0, &PartitionId::new("p0"));
	assert!(matches!(failed[0].1, Error::FatalPartition { attempts: 3, .. }));

	assert!(report.outcomes[&PartitionId::new("p1")].is_ok());
	assert_eq!(checkpoints.get(&PartitionId::new("p0")), Some(SequenceToken::from(1)));
	assert_eq!(checkpoints.get(&PartitionId::new("p1")), Some(SequenceToken::from(2)));
}

#[tokio::test]
async fn test_shutdown_drains_open_batch() {
	let stream = MemoryChangeStream::new();
	stream.extend("p0", record::removes(&["a", "b", "c"], "user", 1));

	let sink = MemorySink::new();
	let checkpoints = MemoryCheckpointStore::new();
	let exporter = Arc::new(Exporter::new(
		config().batch_max_events(100).batch_max_age_seconds(3600),
		Arc::new(stream),
		Arc::new(sink.clone()),
		Arc::new(checkpoints.clone()),
	));

	let runner = exporter.clone();
	let handle = tokio::spawn(async move { runner.run().await });

	let metrics = exporter.metrics();
	let p0 = PartitionId::new("p0");
	wait_for(|| metrics.snapshot(&p0).is_some_and(|m| m.records_pulled == 3), "records should be pulled").await;
	assert!(sink.events().is_empty());

	exporter.shutdown();
	let report = handle.await.unwrap().unwrap();

	assert!(report.is_clean());
	assert_eq!(ids(&sink), vec!["a", "b", "c"]);
	assert_eq!(checkpoints.get(&p0), Some(SequenceToken::from(3)));
}

#[tokio::test]
async fn test_tick_seals_aged_batch() {
	let stream = MemoryChangeStream::new();
	stream.extend("p0", record::removes(&["a", "b"], "user", 1));

	let clock = MockClock::default();
	let sink = MemorySink::new();
	let checkpoints = MemoryCheckpointStore::new();
	let exporter = Arc::new(
		Exporter::new(
			config().batch_max_events(100).batch_max_age_seconds(1),
			Arc::new(stream),
			Arc::new(sink.clone()),
			Arc::new(checkpoints.clone()),
		)
		.with_clock(Arc::new(clock.clone())),
	);

	let runner = exporter.clone();
	let handle = tokio::spawn(async move { runner.run().await });

	let metrics = exporter.metrics();
	let p0 = PartitionId::new("p0");
	wait_for(|| metrics.snapshot(&p0).is_some_and(|m| m.records_pulled == 2), "records should be pulled").await;
	assert!(sink.objects().is_empty());

	clock.advance(chrono::Duration::seconds(2));
	wait_for(|| sink.objects().len() == 1, "aged batch should be flushed by a tick").await;
	assert_eq!(ids(&sink), vec!["a", "b"]);

	exporter.shutdown();
	handle.await.unwrap().unwrap();
	assert_eq!(checkpoints.get(&p0), Some(SequenceToken::from(2)));
	assert_eq!(sink.objects().len(), 1);
}

#[tokio::test]
async fn test_records_arriving_after_idle_pull_are_exported() {
	let stream = MemoryChangeStream::new();
	stream.add_partition("p0");

	let sink = MemorySink::new();
	let checkpoints = MemoryCheckpointStore::new();
	let exporter = Arc::new(Exporter::new(
		config().flush_on_pull_end(true).poll_interval_ms(100).tick_interval_ms(20),
		Arc::new(stream.clone()),
		Arc::new(sink.clone()),
		Arc::new(checkpoints.clone()),
	));

	let runner = exporter.clone();
	let handle = tokio::spawn(async move { runner.run().await });

	let metrics = exporter.metrics();
	let p0 = PartitionId::new("p0");
	wait_for(|| metrics.snapshot(&p0).is_some(), "partition should start").await;

	// Several ticks pass while the partition sits idle between polls.
	tokio::time::sleep(Duration::from_millis(150)).await;
	stream.extend("p0", record::removes(&["a", "b"], "user", 1));

	wait_for(|| sink.events().len() == 2, "late records should be pulled despite ticks").await;
	assert_eq!(ids(&sink), vec!["a", "b"]);

	exporter.shutdown();
	assert!(handle.await.unwrap().unwrap().is_clean());
	assert_eq!(checkpoints.get(&p0), Some(SequenceToken::from(2)));
}

#[tokio::test]
async fn test_resume_from_checkpoint_file() {
	let dir = TempDir::new().unwrap();
	let checkpoint_path = dir.join("checkpoints.json");

	let first = MemoryChangeStream::new();
	first.extend("p0", record::removes(&["a", "b", "c"], "user", 1));
	first.close("p0");

	let sink = MemorySink::new();
	let exporter = Exporter::new(
		config(),
		Arc::new(first),
		Arc::new(sink.clone()),
		Arc::new(FileCheckpointStore::open(&checkpoint_path).await.unwrap()),
	);
	assert!(exporter.run().await.unwrap().is_clean());
	assert_eq!(ids(&sink), vec!["a", "b", "c"]);

	let second = MemoryChangeStream::new();
	second.extend("p0", record::removes(&["a", "b", "c", "d", "e"], "user", 1));
	second.close("p0");

	let resumed = MemorySink::new();
	let exporter = Exporter::new(
		config(),
		Arc::new(second),
		Arc::new(resumed.clone()),
		Arc::new(FileCheckpointStore::open(&checkpoint_path).await.unwrap()),
	);
	assert!(exporter.run().await.unwrap().is_clean());
	assert_eq!(ids(&resumed), vec!["d", "e"]);
}

#[tokio::test]
async fn test_file_stream_to_directory_sink() {
	let dir = TempDir::new().unwrap();
	let stream_dir = dir.join("stream");
	let sink_dir = dir.join("archive");
	fs::create_dir_all(&stream_dir).unwrap();

	let lines: Vec<String> = [
		record::remove("a", "user", 1),
		record::modify("b", "user", 2),
		record::remove("c", "order", 3),
	]
	.iter()
	.map(|r| r.to_json().unwrap())
	.collect();
	fs::write(stream_dir.join("shard-0001.jsonl"), lines.join("\n") + "\nnot json\n").unwrap();
	fs::write(stream_dir.join("shard-0001.closed"), "").unwrap();

	let exporter = Exporter::new(
		config().object_prefix("deletions"),
		Arc::new(FileChangeStream::new(&stream_dir)),
		Arc::new(DirectorySink::new(&sink_dir)),
		Arc::new(FileCheckpointStore::open(dir.join("checkpoints.json")).await.unwrap()),
	);
	let report = exporter.run().await.unwrap();
	assert!(report.is_clean());

	let metrics = &report.metrics[&PartitionId::new("shard-0001")];
	assert_eq!(metrics.records_pulled, 3);
	assert_eq!(metrics.records_unparseable, 1);

	let objects: Vec<_> = fs::read_dir(sink_dir.join("deletions")).unwrap().map(|entry| entry.unwrap().path()).collect();
	assert_eq!(objects.len(), 1);

	let name = objects[0].file_name().unwrap().to_string_lossy().to_string();
	assert!(name.ends_with("_shard-0001_1.ndjson"), "unexpected object name {}", name);

	let body = fs::read_to_string(&objects[0]).unwrap();
	let lines: Vec<&str> = body.lines().collect();
	assert_eq!(lines.len(), 2);
	assert!(lines[0].contains("\"sourceEventId\":\"evt-a\""));
	assert!(lines[1].contains("\"dataType\":\"order\""));
}
