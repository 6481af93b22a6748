use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde representation matches `as_str` so wire and storage agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ScalpType {
    Graso => "graso",
    Seco => "seco",
    Mixto => "mixto",
    Normal => "normal",
});

str_enum!(WashFrequency {
    Diario => "diario",
    Interdiario => "interdiario",
    DosPorSemana => "dos_por_semana",
    Semanal => "semanal",
});

str_enum!(AlopeciaType {
    Androgenetica => "androgenetica",
    Areata => "areata",
    EfluvioTelogeno => "efluvio_telogeno",
    Cicatricial => "cicatricial",
    Otra => "otra",
});

str_enum!(TreatmentKind {
    Individual => "individual",
    Multiple => "multiple",
});

str_enum!(LabRequestStatus {
    Pendiente => "pendiente",
    EnProceso => "en_proceso",
    Completada => "completada",
});

str_enum!(FileKind {
    Estudio => "estudio",
    FotoAntes => "foto_antes",
    FotoDespues => "foto_despues",
});

str_enum!(ConsultType {
    PrimeraVez => "primera_vez",
    Seguimiento => "seguimiento",
    Control => "control",
});

str_enum!(AppointmentStatus {
    Programada => "programada",
    EnCurso => "en_curso",
    Completada => "completada",
    Cancelada => "cancelada",
});

str_enum!(TreatmentPlan {
    Mensual => "mensual",
    Quincenal => "quincenal",
    SesionUnica => "sesion_unica",
});

str_enum!(PaymentStatus {
    Pendiente => "pendiente",
    Pagado => "pagado",
    Vencido => "vencido",
    Cancelado => "cancelado",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn as_str_round_trips() {
        for status in [
            PaymentStatus::Pendiente,
            PaymentStatus::Pagado,
            PaymentStatus::Vencido,
            PaymentStatus::Cancelado,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            TreatmentPlan::from_str("sesion_unica").unwrap(),
            TreatmentPlan::SesionUnica
        );
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = AppointmentStatus::from_str("no_asistio").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&FileKind::FotoAntes).unwrap();
        assert_eq!(json, "\"foto_antes\"");
        let back: FileKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FileKind::FotoAntes);
    }
}
