use rcgen::{CertifiedKey, generate_simple_self_signed};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use framewire_tls::{TlsClientConfig, TlsServerConfig, accept, connect};

fn self_signed_pair() -> (CertificateDer<'static>, rustls::ServerConfig) {
    let CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(vec!["localhost".to_string()]).expect("self-signed cert generation");
    let cert_der = cert.der().clone();
    let key_der: PrivateKeyDer<'static> = PrivatePkcs8KeyDer::from(signing_key.serialize_der()).into();

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .expect("valid self-signed cert/key pair");

    (cert_der, server_config)
}

fn client_config_trusting(cert_der: &CertificateDer<'static>) -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der.clone()).expect("add self-signed cert as trust root");
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_completes_and_carries_application_bytes() {
    let (cert_der, server_config) = self_signed_pair();
    let tls_server = TlsServerConfig::new(server_config);
    let tls_client = TlsClientConfig::new(client_config_trusting(&cert_der));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut tls_stream = accept(stream, &tls_server).await.unwrap();
        let mut buf = [0u8; 5];
        tls_stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        tls_stream.write_all(b"world").await.unwrap();
    });

    let stream = TcpStream::connect(local_addr).await.unwrap();
    let mut tls_stream = connect(stream, &tls_client, "localhost").await.unwrap();
    tls_stream.write_all(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    tls_stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"world");

    server_task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_rejects_a_server_name_mismatching_the_certificate() {
    let (cert_der, server_config) = self_signed_pair();
    let tls_server = TlsServerConfig::new(server_config);
    let tls_client = TlsClientConfig::new(client_config_trusting(&cert_der));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = accept(stream, &tls_server).await;
    });

    let stream = TcpStream::connect(local_addr).await.unwrap();
    let err = connect(stream, &tls_client, "not-the-right-name.example").await;
    assert!(err.is_err(), "the server's cert only covers \"localhost\"");
}
