// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 帧输入: 单张图片, 或目录中按文件名排序的图片序列
// 解码在独立线程中进行, 通过有界通道交给跟踪线程

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver};
use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 解码线程与跟踪线程之间的默认队列长度
pub const DEFAULT_QUEUE: usize = 8;

/// 一帧输入
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub path: PathBuf,
    pub image: DynamicImage,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// 帧来源
#[derive(Debug, Clone)]
pub struct FrameSource {
    paths: Vec<PathBuf>,
}

impl FrameSource {
    /// 打开图片文件或图片目录
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;

        let paths = if meta.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_file(p))
                .collect();
            paths.sort();
            paths
        } else {
            vec![path.to_path_buf()]
        };

        if paths.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no image files in {}", path.display()),
            )
            .into());
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// 启动解码线程
    ///
    /// 第一张无法读取的图片视为输入结束
    pub fn spawn(self, queue: usize) -> FrameStream {
        let (tx, rx) = bounded::<Frame>(queue.max(1));

        let handle = std::thread::spawn(move || {
            let mut decoded = 0;
            for (index, path) in self.paths.into_iter().enumerate() {
                let image = match image::open(&path) {
                    Ok(img) => img,
                    Err(e) => {
                        warn!("⚠️  无法读取 {}: {}, 输入结束", path.display(), e);
                        break;
                    }
                };
                debug!("decoded frame {} ({})", index, path.display());
                if tx.send(Frame { index, path, image }).is_err() {
                    break;
                }
                decoded += 1;
            }
            decoded
        });

        FrameStream { rx, handle }
    }
}

/// 解码线程的输出端
pub struct FrameStream {
    rx: Receiver<Frame>,
    handle: JoinHandle<usize>,
}

impl FrameStream {
    /// 停止接收并等待解码线程退出, 返回已解码帧数
    pub fn finish(self) -> usize {
        drop(self.rx);
        self.handle.join().unwrap_or(0)
    }
}

impl Iterator for FrameStream {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.rx.recv().ok()
    }
}
