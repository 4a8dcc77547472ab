mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{box_glb, box_mesh, boxes_obj, fetcher, gltf_with_external_buffer, MockTransport};
use glam::Vec3;
use mesh_viewer::core::CancelToken;
use mesh_viewer::error::{ErrorKind, ViewerError};
use mesh_viewer::types::{ModelFormat, ModelReference};

#[cfg(test)]
mod fetcher_tests {
    use super::*;

    #[tokio::test]
    async fn test_glb_decodes_to_scene() {
        let transport = MockTransport::new();
        transport.serve("https://cdn.test/a.glb", box_glb([1.0, 2.0, 3.0], [2.0, 4.0, 6.0]));

        let scene = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/a.glb"), |_| {}, &CancelToken::new())
            .await
            .unwrap();

        let stats = scene.stats();
        assert_eq!(stats.mesh_count, 1);
        assert_eq!(stats.vertex_count, 8);
        assert_eq!(stats.triangle_count, 12);

        let bounds = scene.bounds();
        assert!((bounds.min - Vec3::new(0.0, 0.0, 0.0)).length() < 1e-5);
        assert!((bounds.max - Vec3::new(2.0, 4.0, 6.0)).length() < 1e-5);
        assert_eq!(scene.materials.len(), 1, "default material is added");
    }

    #[tokio::test]
    async fn test_obj_objects_become_meshes() {
        let transport = MockTransport::new();
        let obj = boxes_obj(&[([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]), ([3.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);
        transport.serve("https://cdn.test/two.obj", obj);

        let scene = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/two.obj"), |_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(scene.stats().mesh_count, 2);
        assert_eq!(scene.stats().triangle_count, 24);
        assert!((scene.bounds().max_extent() - 4.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_unsupported_formats_never_touch_the_network() {
        let transport = MockTransport::new();
        let fetcher = fetcher(&transport);

        for format in [ModelFormat::Fbx, ModelFormat::Usdz] {
            let reference = ModelReference::new(format!("https://cdn.test/model.{}", format), format);
            let err = fetcher
                .fetch(&reference, |_| {}, &CancelToken::new())
                .await
                .unwrap_err();
            assert_eq!(err, ViewerError::UnsupportedFormat(format.to_string()));
        }

        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_starts_at_zero_and_never_decreases() {
        let transport = MockTransport::new();
        transport.serve("https://cdn.test/a.glb", box_glb([0.0; 3], [1.0; 3]));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        fetcher(&transport)
            .fetch(
                &ModelReference::from_url("https://cdn.test/a.glb"),
                move |p| sink.lock().unwrap().push(p),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "progress {:?}", seen);
        assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    }

    #[tokio::test]
    async fn test_missing_asset_is_a_network_error() {
        let transport = MockTransport::new();

        let err = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/gone.glb"), |_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_corrupt_asset_is_a_decode_error() {
        let transport = MockTransport::new();
        transport.serve("https://cdn.test/bad.glb", b"glTF but not really".to_vec());

        let err = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/bad.glb"), |_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_external_gltf_buffer_is_fetched_relative_to_the_document() {
        let transport = MockTransport::new();
        let (positions, indices) = box_mesh([0.0; 3], [2.0; 3]);
        let (document, buffer) = gltf_with_external_buffer(&positions, &indices, "buffers/box.bin");
        transport.serve("https://cdn.test/models/box.gltf", document);
        transport.serve("https://cdn.test/models/buffers/box.bin", buffer);

        let scene = fetcher(&transport)
            .fetch(
                &ModelReference::from_url("https://cdn.test/models/box.gltf"),
                |_| {},
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(scene.stats().triangle_count, 12);
        assert_eq!(
            transport.requests(),
            vec![
                "https://cdn.test/models/box.gltf".to_string(),
                "https://cdn.test/models/buffers/box.bin".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_external_buffer_is_rejected() {
        let transport = MockTransport::new();
        let (positions, indices) = box_mesh([0.0; 3], [2.0; 3]);
        let (document, buffer) = gltf_with_external_buffer(&positions, &indices, "box.bin");
        transport.serve("https://cdn.test/box.gltf", document);
        transport.serve("https://cdn.test/box.bin", buffer[..buffer.len() / 2].to_vec());

        let err = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/box.gltf"), |_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_the_download() {
        let transport = MockTransport::new();
        transport.serve_delayed("https://cdn.test/slow.glb", box_glb([0.0; 3], [1.0; 3]), Duration::from_secs(30));
        let fetcher = fetcher(&transport);
        let cancel = CancelToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                fetcher
                    .fetch(&ModelReference::from_url("https://cdn.test/slow.glb"), |_| {}, &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, ViewerError::Cancelled);
        assert!(err.kind().is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_downloads_nothing() {
        let transport = MockTransport::new();
        transport.serve("https://cdn.test/a.glb", box_glb([0.0; 3], [1.0; 3]));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = fetcher(&transport)
            .fetch(&ModelReference::from_url("https://cdn.test/a.glb"), |_| {}, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, ViewerError::Cancelled);
        assert_eq!(transport.request_count(), 0);
    }
}
