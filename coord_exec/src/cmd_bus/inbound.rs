//! Inbound queues
//!
//! The bus listener pushes every parsed message into an unbounded queue. The control cycle never
//! blocks on these: each read drains the queue and keeps only the newest item, so a slow cycle
//! can never fall behind the producers.

use std::sync::mpsc::{channel, Receiver, Sender};

use comms_if::eqpt::{cam::CamImage, det::DetectionMsg, gps::GpsReport, imu::SensorSample};

/// Producer side of the inbound queues.
#[derive(Debug, Clone)]
pub struct InboundTx {
    pub detections: Sender<DetectionMsg>,
    pub frames: Sender<CamImage>,
    pub imu: Sender<SensorSample>,
    pub gps: Sender<GpsReport>,
}

/// Consumer side of the inbound queues, owned by the coordinator.
#[derive(Debug)]
pub struct Inbound {
    detections: Receiver<DetectionMsg>,
    frames: Receiver<CamImage>,
    imu: Receiver<SensorSample>,
    gps: Receiver<GpsReport>,
}

/// Create the inbound queues.
pub fn inbound_channels() -> (InboundTx, Inbound) {
    let (det_tx, det_rx) = channel();
    let (frame_tx, frame_rx) = channel();
    let (imu_tx, imu_rx) = channel();
    let (gps_tx, gps_rx) = channel();

    (
        InboundTx {
            detections: det_tx,
            frames: frame_tx,
            imu: imu_tx,
            gps: gps_tx,
        },
        Inbound {
            detections: det_rx,
            frames: frame_rx,
            imu: imu_rx,
            gps: gps_rx,
        },
    )
}

impl Inbound {
    pub fn newest_detection(&self) -> Option<DetectionMsg> {
        self.detections.try_iter().last()
    }

    pub fn newest_frame(&self) -> Option<CamImage> {
        self.frames.try_iter().last()
    }

    pub fn newest_imu(&self) -> Option<SensorSample> {
        self.imu.try_iter().last()
    }

    pub fn newest_gps(&self) -> Option<GpsReport> {
        self.gps.try_iter().last()
    }

    /// Block up to `timeout` for an IMU sample, used to detect the IMU at startup.
    pub fn wait_imu(&self, timeout: std::time::Duration) -> Option<SensorSample> {
        self.imu.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_newest_wins() {
        let (tx, rx) = inbound_channels();
        assert!(rx.newest_detection().is_none());

        for i in 0..3 {
            tx.gps
                .send(GpsReport {
                    mode: 3,
                    lat: Some(i as f64),
                    lon: Some(0.0),
                })
                .unwrap();
        }

        assert_eq!(rx.newest_gps().unwrap().lat, Some(2.0));
        assert!(rx.newest_gps().is_none());
    }
}
