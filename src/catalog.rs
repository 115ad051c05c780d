//! Default indicator template applied to new projects.

use crate::models::{AnswerKind, IndicatorShape, NewIndicator, Periodicity, Unit};

struct TemplateEntry {
    code: &'static str,
    name: &'static str,
    unit: Unit,
    bounds: (Option<f64>, Option<f64>),
    shape: IndicatorShape,
}

const fn general(code: &'static str, name: &'static str, unit: Unit) -> TemplateEntry {
    TemplateEntry {
        code,
        name,
        unit,
        bounds: (None, None),
        shape: IndicatorShape::General,
    }
}

const fn strategic(
    code: &'static str,
    name: &'static str,
    kind: AnswerKind,
    unit: Unit,
) -> TemplateEntry {
    TemplateEntry {
        code,
        name,
        unit,
        bounds: (None, None),
        shape: IndicatorShape::Strategic { answer_kind: kind },
    }
}

const fn tracking(
    code: &'static str,
    name: &'static str,
    periodicity: Periodicity,
    unit: Unit,
) -> TemplateEntry {
    TemplateEntry {
        code,
        name,
        unit,
        bounds: (None, None),
        shape: IndicatorShape::Tracking { periodicity },
    }
}

const TEMPLATE: &[TemplateEntry] = &[
    general("IG-01", "Superficie renaturalizada", Unit::Hectares),
    general("IG-02", "Superficie de suelo desimpermeabilizado", Unit::Hectares),
    general("IG-03", "Cobertura de copa arbórea", Unit::Percentage),
    general("IG-04", "Longitud de corredores verdes", Unit::Meters),
    general("IG-05", "Número de árboles plantados", Unit::Count),
    general("IG-06", "Especies autóctonas introducidas", Unit::Count),
    general("IG-07", "Población con zona verde a menos de 300 m", Unit::Percentage),
    general("IG-08", "Inversión ejecutada", Unit::Euros),
    TemplateEntry {
        code: "IG-09",
        name: "Índice de conectividad ecológica",
        unit: Unit::Index,
        bounds: (Some(0.0), Some(1.0)),
        shape: IndicatorShape::General,
    },
    general("IG-10", "Temperatura superficial media en verano (ºC)", Unit::Number),
    strategic(
        "IE-01",
        "Plan de gestión de la infraestructura verde aprobado",
        AnswerKind::YesNo,
        Unit::Number,
    ),
    strategic(
        "IE-02",
        "Ordenanza municipal de biodiversidad vigente",
        AnswerKind::YesNo,
        Unit::Number,
    ),
    strategic("IE-03", "Participación ciudadana en el diseño", AnswerKind::YesNo, Unit::Number),
    strategic("IE-04", "Entidades locales colaboradoras", AnswerKind::Numeric, Unit::Count),
    strategic(
        "IE-05",
        "Presupuesto municipal anual para mantenimiento",
        AnswerKind::Numeric,
        Unit::Euros,
    ),
    strategic(
        "IE-06",
        "Acciones de educación ambiental realizadas",
        AnswerKind::Numeric,
        Unit::Count,
    ),
    tracking("IS-01", "Especies de aves observadas", Periodicity::Quarterly, Unit::Count),
    tracking("IS-02", "Especies de polinizadores observadas", Periodicity::Quarterly, Unit::Count),
    tracking(
        "IS-03",
        "Supervivencia del arbolado plantado",
        Periodicity::Biannual,
        Unit::Percentage,
    ),
    tracking("IS-04", "Consumo de agua de riego (m³)", Periodicity::Monthly, Unit::Number),
    tracking(
        "IS-05",
        "Visitantes de los espacios renaturalizados",
        Periodicity::Quarterly,
        Unit::Count,
    ),
    tracking("IS-06", "Superficie con especies invasoras", Periodicity::Annual, Unit::Hectares),
];

/// The template as indicator definitions ready to insert into a project.
pub fn default_template() -> Vec<NewIndicator> {
    TEMPLATE
        .iter()
        .map(|entry| NewIndicator {
            code: entry.code.to_string(),
            name: entry.name.to_string(),
            description: None,
            unit: entry.unit,
            min_value: entry.bounds.0,
            max_value: entry.bounds.1,
            shape: entry.shape,
        })
        .collect()
}
