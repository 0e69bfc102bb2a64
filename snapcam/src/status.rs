//! Texts shown in the status region and alerts of the page.
use std::time::Duration;

pub const MODEL_LOADING: &str = "Cargando modelo de IA...";
pub const MODEL_READY: &str = "Modelo de IA cargado.";
pub const MODEL_FAILED: &str = "Error al cargar el modelo de IA. Verifique la consola.";
pub const MODEL_NOT_READY: &str = "El modelo de IA no está cargado.";
pub const INFERRING: &str = "Procesando imagen con IA...";
pub const INFER_FAILED: &str = "Error al procesar la imagen con IA.";
pub const INFER_TIMEOUT: &str = "Tiempo de espera agotado al procesar la imagen.";
pub const INFER_BUSY: &str = "El modelo de IA sigue procesando la imagen anterior.";
pub const CAMERA_FAILED: &str = "No se pudo acceder a la webcam.";

pub fn countdown(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis % 1000 == 0 {
        format!("Capturando imagen en {} segundos...", millis / 1000)
    } else {
        format!("Capturando imagen en {:.1} segundos...", delay.as_secs_f32())
    }
}

pub fn pose_summary(num_keypoints: usize) -> String {
    format!("Pose detectada: {num_keypoints} puntos clave.")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn countdown_text_in_whole_seconds() {
        assert_eq!(
            countdown(Duration::from_millis(3000)),
            "Capturando imagen en 3 segundos..."
        );
        assert_eq!(
            countdown(Duration::from_millis(1500)),
            "Capturando imagen en 1.5 segundos..."
        );
    }
}
