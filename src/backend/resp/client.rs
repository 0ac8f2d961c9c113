use bytes::BytesMut;
use epher_error::BackendError;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufWriter},
    net::TcpStream,
};
use tracing::{debug, trace};

use super::{
    decoder::RespDecoder,
    frame::RespFrame,
    RespConfig,
};

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Одно TCP-соединение с RESP-сервером.
pub struct RespConnection {
    stream: BufWriter<TcpStream>,
    read_buf: BytesMut,
    decoder: RespDecoder,
}

impl RespConnection {
    /// Подключается и выполняет `AUTH`/`SELECT` согласно настройкам.
    pub async fn connect(config: &RespConfig) -> Result<Self, BackendError> {
        let connect = TcpStream::connect(&config.address);
        let stream = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| BackendError::ConnectionFailed {
                address: config.address.clone(),
                reason: "connect timed out".to_string(),
            })?
            .map_err(|e| BackendError::ConnectionFailed {
                address: config.address.clone(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream: BufWriter::new(stream),
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            decoder: RespDecoder::new(),
        };

        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            conn.request(&RespFrame::command(["AUTH".to_string(), password.to_string()]))
                .await?;
        }
        if config.database != 0 {
            conn.request(&RespFrame::command([
                "SELECT".to_string(),
                config.database.to_string(),
            ]))
            .await?;
        }

        debug!(address = %config.address, "Connected to RESP server");
        Ok(conn)
    }

    /// Отправляет фрейм и сбрасывает буфер записи.
    pub async fn send(
        &mut self,
        frame: &RespFrame,
    ) -> Result<(), BackendError> {
        let mut out = BytesMut::new();
        frame.encode(&mut out)?;
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Читает следующий фрейм.
    ///
    /// Безопасен для отмены: частично прочитанные байты остаются в буфере
    /// и будут разобраны следующим вызовом.
    pub async fn read_frame(&mut self) -> Result<RespFrame, BackendError> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                trace!(?frame, "RESP frame received");
                return Ok(frame);
            }

            let n = self.stream.get_mut().read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(BackendError::Closed);
            }
        }
    }

    /// Отправляет команду и ждёт ответ. Ответ-ошибка превращается в
    /// [`BackendError::Rejected`].
    pub async fn request(
        &mut self,
        frame: &RespFrame,
    ) -> Result<RespFrame, BackendError> {
        self.send(frame).await?;
        match self.read_frame().await? {
            RespFrame::Error(reason) => Err(BackendError::Rejected { reason }),
            reply => Ok(reply),
        }
    }

    /// `PING`, ожидая `PONG`.
    pub async fn ping(&mut self) -> Result<(), BackendError> {
        let reply = self.request(&RespFrame::command(["PING"])).await?;
        if reply.eq_ignore_case("PONG") {
            Ok(())
        } else {
            Err(BackendError::Protocol {
                reason: format!("unexpected PING reply: {reply:?}"),
            })
        }
    }
}

impl std::fmt::Debug for RespConnection {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RespConnection")
            .field("peer", &self.stream.get_ref().peer_addr().ok())
            .field("buffered", &self.read_buf.len())
            .finish()
    }
}
