//! KWP2000 client against the mock transport

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rackflash_core::{FirmwareImage, FlashSegment, Variant};
use rackflash_flash::{
    DiagnosticSession, FlashConfig, FlashPlan, IdentificationKind, Orchestrator, ProviderError,
    RoutineId,
};
use rackflash_kwp::transport::mock::{MockTransportAdapter, MOCK_IDENTIFICATION};
use rackflash_kwp::{
    Kwp2000Client, KwpError, MockConfig, NegativeResponseCode, TransportAdapter, TransportError,
};
use rstest::rstest;

async fn connected_client() -> (Arc<MockTransportAdapter>, Kwp2000Client) {
    let mock = Arc::new(MockTransportAdapter::new(&MockConfig::default()));
    let mut client = Kwp2000Client::new(mock.clone());
    DiagnosticSession::open(&mut client, 1).await.unwrap();
    (mock, client)
}

#[rstest]
#[case::download(0x2A4, 0x1E, vec![0x34, 0x00, 0x02, 0xA4, 0x00, 0x00, 0x00, 0x1E])]
#[case::asw(0xA000, 0x56000, vec![0x34, 0x00, 0xA0, 0x00, 0x00, 0x05, 0x60, 0x00])]
#[tokio::test]
async fn request_download_encoding(#[case] address: u32, #[case] len: u32, #[case] expected: Vec<u8>) {
    let (mock, client) = connected_client().await;

    let block = client.request_download(address, len).await.unwrap();

    assert_eq!(block, 254);
    assert_eq!(mock.sent(), vec![expected]);
}

#[tokio::test]
async fn routine_requests_carry_range_and_checksum() {
    let (mock, mut client) = connected_client().await;

    let handle = client.start_erase(0x2A4, 0x2C1).await.unwrap();
    assert_eq!(handle.routine, RoutineId::EraseFlash);
    client.start_checksum(0x2A4, 0x2C1, 0xBEEF).await.unwrap();
    let result = client.routine_result(RoutineId::FlashChecksum).await.unwrap();

    assert_eq!(result, vec![0x00]);
    assert_eq!(
        mock.sent(),
        vec![
            vec![0x31, 0xC4, 0x00, 0x02, 0xA4, 0x00, 0x02, 0xC1],
            vec![0x31, 0xC5, 0x00, 0x02, 0xA4, 0x00, 0x02, 0xC1, 0xBE, 0xEF],
            vec![0x33, 0xC5],
        ]
    );
}

#[tokio::test]
async fn session_and_security_requests() {
    let (mock, mut client) = connected_client().await;

    client
        .enter_session(rackflash_flash::SessionKind::Programming)
        .await
        .unwrap();
    let seed = client.request_seed().await.unwrap();
    client.send_key(&[0x1B, 0x18, 0x36, 0x0B]).await.unwrap();
    client.keep_alive().await.unwrap();

    assert_eq!(seed, vec![0x5C, 0x00, 0x00, 0x00]);
    assert_eq!(
        mock.sent(),
        vec![
            vec![0x10, 0x85],
            vec![0x27, 0x01],
            vec![0x27, 0x02, 0x1B, 0x18, 0x36, 0x0B],
            vec![0x3E, 0x01],
        ]
    );
}

#[tokio::test]
async fn identification_strips_echo() {
    let (_mock, mut client) = connected_client().await;

    let ident = client
        .read_identification(IdentificationKind::EcuIdentification)
        .await
        .unwrap();

    assert_eq!(ident, MOCK_IDENTIFICATION.to_vec());
}

#[tokio::test]
async fn response_pending_waits_without_resending() {
    let (mock, client) = connected_client().await;
    mock.queue_response(vec![0x7F, 0x36, 0x78]);
    mock.queue_response(vec![0x7F, 0x36, 0x78]);
    mock.queue_response(vec![0x76]);

    client.transfer_data(&[0xAA; 16]).await.unwrap();

    assert_eq!(mock.sent().len(), 1);
}

#[tokio::test]
async fn response_pending_without_follow_up_times_out() {
    let (mock, client) = connected_client().await;
    mock.queue_response(vec![0x7F, 0x37, 0x78]);

    let err = client.request_transfer_exit().await.unwrap_err();

    assert!(matches!(err, KwpError::Transport(TransportError::Timeout(_))));
}

#[tokio::test]
async fn negative_response_maps_to_rejected() {
    let (mock, mut client) = connected_client().await;
    mock.add_response(vec![0x27, 0x02], vec![0x7F, 0x27, 0x35]);

    let err = client.send_key(&[0, 0, 0, 0]).await.unwrap_err();

    assert_eq!(
        err,
        ProviderError::Rejected {
            service: 0x27,
            code: 0x35,
            reason: NegativeResponseCode::InvalidKey.to_string(),
        }
    );
    assert!(!err.is_transport());
}

#[tokio::test]
async fn unexpected_positive_sid_is_invalid() {
    let (mock, client) = connected_client().await;
    mock.queue_response(vec![0x71, 0xC4]);

    let err = client.routine_results(0xC4).await.unwrap_err();

    assert!(matches!(err, KwpError::InvalidResponse(_)));
}

#[tokio::test]
async fn closed_channel_is_a_transport_error() {
    let mock = Arc::new(MockTransportAdapter::new(&MockConfig::default()));
    let mut client = Kwp2000Client::new(mock);

    let err = client.keep_alive().await.unwrap_err();

    assert!(err.is_transport());
}

#[tokio::test]
async fn orchestrator_runs_over_mock_unit() {
    let mock = Arc::new(MockTransportAdapter::new(&MockConfig::default()));
    let client = Kwp2000Client::new(mock.clone());
    let image = FirmwareImage::from_bytes((0..0x1000).map(|i| (i % 253) as u8).collect());
    let segments = vec![FlashSegment::new(0x100, 0x1FF), FlashSegment::new(0x300, 0x3FF)];
    let plan = FlashPlan {
        variant: Variant::Sw3501,
        bus: 1,
        total_bytes: 0x200,
        segments,
    };
    let config = FlashConfig {
        reconnect_backoff_ms: 0,
        ..FlashConfig::default()
    };

    let mut orchestrator = Orchestrator::new(client, config);
    let report = orchestrator.run(&plan, &image).await.unwrap();

    assert_eq!(report.segments_written, 2);
    assert_eq!(report.bytes_written, 0x200);
    assert_eq!(report.chunks_sent, 4);
    assert_eq!(report.ecu_identification, hex::encode(MOCK_IDENTIFICATION));

    let sent = mock.sent();
    assert_eq!(sent.first(), Some(&vec![0x10, 0x85]));
    assert_eq!(sent.last(), Some(&vec![0x82]));
    let transfers: Vec<usize> = sent
        .iter()
        .filter(|req| req[0] == 0x36)
        .map(|req| req.len() - 1)
        .collect();
    assert_eq!(transfers, vec![240, 16, 240, 16]);
    assert!(!mock.is_connected().await);
}
